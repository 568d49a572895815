//! Virtual garage racing: engine sessions, race coordination and winner
//! bookkeeping on top of an asynchronous garage backend.

#[macro_use] extern crate log;

pub mod config;
pub mod error;
pub mod garage;
pub mod race;

pub use config::Config;
pub use error::{ GarageError, Result };
pub use garage::{ Car, CarId, Garage };
pub use race::{ RaceCoordinator, RaceEvent, RaceSettings };
