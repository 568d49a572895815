use std::sync::Arc;

use crate::error::Result;
use crate::garage::{ CarId, Garage, NewWinner, Winner, WinnerPatch };

/// Records a race win: creates the winner row on a car's first win, otherwise
/// bumps `wins` and keeps the smaller best time.
pub struct WinnerResolver<G: Garage> {
    garage: Arc<G>,
}

impl<G: Garage> Clone for WinnerResolver<G> {
    fn clone(&self) -> Self {
        WinnerResolver { garage: self.garage.clone() }
    }
}

impl<G: Garage> WinnerResolver<G> {
    pub fn new(garage: Arc<G>) -> WinnerResolver<G> {
        WinnerResolver { garage }
    }

    pub async fn upsert(&self, car_id: CarId, time: f64) -> Result<Winner> {
        let existing = match self.garage.find_winner_by_car_id(car_id).await {
            Ok(existing) => existing,
            Err(err) if err.is_not_found() => None,
            Err(err) => return Err(err),
        };

        match existing {
            Some(winner) => {
                let patch = WinnerPatch {
                    wins: Some(winner.wins + 1),
                    best_time: Some(winner.best_time.min(time)),
                };
                debug!["Updating winner {} of car {}: {:?}", winner.id, car_id, patch];
                self.garage.update_winner(winner.id, patch).await
            }
            None => {
                info!["No existing winner found for car {}, creating new one", car_id];
                self.garage.create_winner(NewWinner::first_win(car_id, time)).await
            }
        }
    }
}
