use async_trait::async_trait;
use serde::{ Deserialize, Serialize };

use crate::error::{ GarageError, Result };

pub mod in_memory;
pub mod random;
pub mod wire;

pub type CarId = u32;
pub type WinnerId = u32;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Car {
    pub id: CarId,
    pub name: String,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCar {
    pub name: String,
    pub color: String,
}

impl NewCar {
    pub fn new(name: &str, color: &str) -> NewCar {
        NewCar { name: name.to_string(), color: color.to_string() }
    }

    /// Names must be non-blank and colors are `#rrggbb`.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(GarageError::InvalidCar("name must not be empty".to_string()));
        }
        if !is_hex_color(&self.color) {
            return Err(GarageError::InvalidCar(format!["color {} is not #rrggbb", self.color]));
        }
        Ok(())
    }
}

fn is_hex_color(color: &str) -> bool {
    color.len() == 7
        && color.starts_with('#')
        && color[1..].chars().all(|c| c.is_ascii_hexdigit())
}

/// Kinematics reported by an engine start.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EngineData {
    pub velocity: f64,
    pub distance: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriveStatus {
    pub success: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Winner {
    pub id: WinnerId,
    pub car_id: CarId,
    pub wins: u32,
    pub best_time: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WinnerWithCar {
    #[serde(flatten)]
    pub winner: Winner,
    pub car: Car,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewWinner {
    pub car_id: CarId,
    pub best_time: f64,
    pub wins: u32,
}

impl NewWinner {
    pub fn first_win(car_id: CarId, time: f64) -> NewWinner {
        NewWinner { car_id, best_time: time, wins: 1 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WinnerPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wins: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best_time: Option<f64>,
}

/// One page of a listing; `count` is the total across all pages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortField {
    Id,
    Wins,
    Time,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WinnerQuery {
    pub page: usize,
    pub limit: usize,
    pub sort: SortField,
    pub order: SortOrder,
}

impl Default for WinnerQuery {
    fn default() -> Self {
        WinnerQuery { page: 1, limit: 10, sort: SortField::Id, order: SortOrder::Asc }
    }
}

/// Everything the race core needs from the outside world.
///
/// Pages are 1-based. `find_winner_by_car_id` may signal "no winner yet"
/// either with `Ok(None)` or with a not-found error; callers treat both alike.
#[async_trait]
pub trait Garage: Send + Sync + 'static {
    async fn list_cars(&self, page: usize, limit: usize) -> Result<Page<Car>>;
    async fn get_car(&self, id: CarId) -> Result<Car>;
    async fn create_car(&self, car: NewCar) -> Result<Car>;
    async fn update_car(&self, id: CarId, car: NewCar) -> Result<Car>;
    async fn delete_car(&self, id: CarId) -> Result<()>;
    async fn generate_random_cars(&self, count: usize) -> Result<()>;

    async fn start_engine(&self, id: CarId) -> Result<EngineData>;
    /// `success: false` is a breakdown, not an error.
    async fn drive_engine(&self, id: CarId) -> Result<DriveStatus>;
    async fn stop_engine(&self, id: CarId) -> Result<()>;

    async fn list_winners(&self, query: WinnerQuery) -> Result<Page<WinnerWithCar>>;
    async fn get_winner(&self, id: WinnerId) -> Result<Winner>;
    async fn find_winner_by_car_id(&self, car_id: CarId) -> Result<Option<Winner>>;
    async fn create_winner(&self, winner: NewWinner) -> Result<Winner>;
    async fn update_winner(&self, id: WinnerId, patch: WinnerPatch) -> Result<Winner>;
    async fn delete_winner(&self, id: WinnerId) -> Result<()>;
}
