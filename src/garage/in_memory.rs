use std::collections::{ BTreeMap, HashMap };
use std::time::Duration;

use async_std::sync::Mutex;
use async_std::task;
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{ Rng, SeedableRng };

use crate::config::EngineConfig;
use crate::error::{ GarageError, Result };
use crate::garage::random::random_car;
use crate::garage::{
    Car, CarId, DriveStatus, EngineData, Garage, NewCar, NewWinner, Page, SortField, SortOrder,
    Winner, WinnerId, WinnerPatch, WinnerQuery, WinnerWithCar,
};
use crate::race::kinematics::{ check_time_scale, KinematicsGenerator };

const INITIAL_CARS: [(&str, &str); 7] = [
    ("Tesla Model S", "#3f51b5"),
    ("Ford Mustang", "#f44336"),
    ("Chevrolet Camaro", "#ff9800"),
    ("BMW X5", "#4caf50"),
    ("Audi R8", "#2196f3"),
    ("Porsche 911", "#9c27b0"),
    ("Mercedes-Benz S-Class", "#607d8b"),
];

struct Store {
    cars: BTreeMap<CarId, Car>,
    winners: BTreeMap<WinnerId, Winner>,
    engines: HashMap<CarId, EngineData>,
    next_car_id: CarId,
    next_winner_id: WinnerId,
    kinematics: KinematicsGenerator<StdRng>,
}

/// Stand-in for the garage REST backend.
///
/// A drive either succeeds at once or breaks down somewhere along the run,
/// after a delay proportional to the engine's expected duration.
pub struct InMemoryGarage {
    store: Mutex<Store>,
    breakdown_probability: f64,
    time_scale: f64,
}

fn paginate<T: Clone>(items: &[T], page: usize, limit: usize) -> Vec<T> {
    let start = page.saturating_sub(1).saturating_mul(limit);
    items.iter().skip(start).take(limit).cloned().collect()
}

impl InMemoryGarage {
    /// An empty garage.
    pub fn new(engine: &EngineConfig, seed: Option<u64>, time_scale: f64) -> Result<InMemoryGarage> {
        check_time_scale(time_scale)?;
        let store = Store::new(engine, seed)?;
        Ok(InMemoryGarage::from_store(store, engine, time_scale))
    }

    /// A garage holding the seven demo cars, ids 1 to 7.
    pub fn with_demo_cars(engine: &EngineConfig, seed: Option<u64>, time_scale: f64) -> Result<InMemoryGarage> {
        check_time_scale(time_scale)?;
        let mut store = Store::new(engine, seed)?;
        for (name, color) in INITIAL_CARS.iter() {
            store.insert_car(NewCar::new(name, color));
        }
        Ok(InMemoryGarage::from_store(store, engine, time_scale))
    }

    fn from_store(store: Store, engine: &EngineConfig, time_scale: f64) -> InMemoryGarage {
        InMemoryGarage {
            store: Mutex::new(store),
            breakdown_probability: engine.breakdown_probability,
            time_scale,
        }
    }
}

impl Store {
    fn new(engine: &EngineConfig, seed: Option<u64>) -> Result<Store> {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let kinematics = KinematicsGenerator::with_ranges(rng, engine.velocity.clone(), engine.distance.clone())?;

        Ok(Store {
            cars: BTreeMap::new(),
            winners: BTreeMap::new(),
            engines: HashMap::new(),
            next_car_id: 1,
            next_winner_id: 1,
            kinematics,
        })
    }

    fn insert_car(&mut self, car: NewCar) -> Car {
        let id = self.next_car_id;
        self.next_car_id += 1;
        let car = Car { id, name: car.name, color: car.color };
        self.cars.insert(id, car.clone());
        car
    }

    fn winner_of(&self, car_id: CarId) -> Option<&Winner> {
        self.winners.values().find(|winner| winner.car_id == car_id)
    }
}

#[async_trait]
impl Garage for InMemoryGarage {
    async fn list_cars(&self, page: usize, limit: usize) -> Result<Page<Car>> {
        let store = self.store.lock().await;
        let all: Vec<Car> = store.cars.values().cloned().collect();
        Ok(Page { items: paginate(&all, page, limit), count: all.len() })
    }

    async fn get_car(&self, id: CarId) -> Result<Car> {
        self.store.lock().await.cars.get(&id).cloned()
            .ok_or(GarageError::CarNotFound(id))
    }

    async fn create_car(&self, car: NewCar) -> Result<Car> {
        car.validate()?;
        Ok(self.store.lock().await.insert_car(car))
    }

    async fn update_car(&self, id: CarId, car: NewCar) -> Result<Car> {
        car.validate()?;
        let mut store = self.store.lock().await;
        let existing = store.cars.get_mut(&id).ok_or(GarageError::CarNotFound(id))?;
        existing.name = car.name;
        existing.color = car.color;
        Ok(existing.clone())
    }

    async fn delete_car(&self, id: CarId) -> Result<()> {
        let mut store = self.store.lock().await;
        store.cars.remove(&id).ok_or(GarageError::CarNotFound(id))?;
        store.winners.retain(|_, winner| winner.car_id != id);
        store.engines.remove(&id);
        Ok(())
    }

    async fn generate_random_cars(&self, count: usize) -> Result<()> {
        let mut store = self.store.lock().await;
        for _ in 0..count {
            let car = random_car(store.kinematics.rng());
            store.insert_car(car);
        }
        info!["Generated {} random cars", count];
        Ok(())
    }

    async fn start_engine(&self, id: CarId) -> Result<EngineData> {
        let mut store = self.store.lock().await;
        if !store.cars.contains_key(&id) {
            return Err(GarageError::CarNotFound(id));
        }
        let engine = store.kinematics.generate();
        store.engines.insert(id, engine);
        Ok(engine)
    }

    async fn drive_engine(&self, id: CarId) -> Result<DriveStatus> {
        let (breaks_down, delay) = {
            let mut store = self.store.lock().await;
            if !store.cars.contains_key(&id) {
                return Err(GarageError::CarNotFound(id));
            }
            let engine = *store.engines.get(&id).ok_or(GarageError::EngineNotStarted(id))?;
            let rng = store.kinematics.rng();
            let breaks_down = rng.gen_bool(self.breakdown_probability);
            let seconds = engine.duration_seconds()? * rng.gen_range(0.0..1.0) / self.time_scale;
            let delay = Duration::try_from_secs_f64(seconds)
                .map_err(|_| GarageError::InvalidKinematics { velocity: engine.velocity, distance: engine.distance })?;
            (breaks_down, delay)
        };

        if !breaks_down {
            return Ok(DriveStatus { success: true });
        }

        task::sleep(delay).await;
        Ok(DriveStatus { success: false })
    }

    async fn stop_engine(&self, id: CarId) -> Result<()> {
        let mut store = self.store.lock().await;
        if !store.cars.contains_key(&id) {
            return Err(GarageError::CarNotFound(id));
        }
        store.engines.remove(&id);
        Ok(())
    }

    async fn list_winners(&self, query: WinnerQuery) -> Result<Page<WinnerWithCar>> {
        let store = self.store.lock().await;
        let mut all: Vec<Winner> = store.winners.values().cloned().collect();

        all.sort_by(|a, b| {
            let ordering = match query.sort {
                SortField::Id => a.id.cmp(&b.id),
                SortField::Wins => a.wins.cmp(&b.wins),
                SortField::Time => a.best_time.total_cmp(&b.best_time),
            };
            match query.order {
                SortOrder::Asc => ordering,
                SortOrder::Desc => ordering.reverse(),
            }
        });

        let mut items = Vec::with_capacity(query.limit);
        for winner in paginate(&all, query.page, query.limit) {
            let car = store.cars.get(&winner.car_id).cloned()
                .ok_or(GarageError::CarNotFound(winner.car_id))?;
            items.push(WinnerWithCar { winner, car });
        }
        Ok(Page { items, count: all.len() })
    }

    async fn get_winner(&self, id: WinnerId) -> Result<Winner> {
        self.store.lock().await.winners.get(&id).cloned()
            .ok_or(GarageError::WinnerNotFound(id))
    }

    async fn find_winner_by_car_id(&self, car_id: CarId) -> Result<Option<Winner>> {
        Ok(self.store.lock().await.winner_of(car_id).cloned())
    }

    async fn create_winner(&self, winner: NewWinner) -> Result<Winner> {
        let mut store = self.store.lock().await;
        if !store.cars.contains_key(&winner.car_id) {
            return Err(GarageError::CarNotFound(winner.car_id));
        }
        if let Some(existing) = store.winner_of(winner.car_id) {
            return Err(GarageError::Http {
                status: 409,
                message: format!["Winner for car {} already exists (id {})", winner.car_id, existing.id],
            });
        }

        let id = store.next_winner_id;
        store.next_winner_id += 1;
        let created = Winner { id, car_id: winner.car_id, wins: winner.wins, best_time: winner.best_time };
        store.winners.insert(id, created.clone());
        Ok(created)
    }

    async fn update_winner(&self, id: WinnerId, patch: WinnerPatch) -> Result<Winner> {
        let mut store = self.store.lock().await;
        let winner = store.winners.get_mut(&id).ok_or(GarageError::WinnerNotFound(id))?;
        if let Some(wins) = patch.wins {
            winner.wins = wins;
        }
        if let Some(best_time) = patch.best_time {
            winner.best_time = best_time;
        }
        Ok(winner.clone())
    }

    async fn delete_winner(&self, id: WinnerId) -> Result<()> {
        self.store.lock().await.winners.remove(&id)
            .map(|_| ())
            .ok_or(GarageError::WinnerNotFound(id))
    }
}
