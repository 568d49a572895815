use thiserror::Error;

use crate::garage::{CarId, WinnerId};

pub type Result<T> = std::result::Result<T, GarageError>;

#[derive(Error, Debug)]
pub enum GarageError {
    #[error("Car with id {0} not found")]
    CarNotFound(CarId),

    #[error("Winner with id {0} not found")]
    WinnerNotFound(WinnerId),

    #[error("No winner recorded for car {0}")]
    NoWinnerForCar(CarId),

    #[error("Engine of car {0} is already running")]
    EngineBusy(CarId),

    #[error("Engine of car {0} was not started")]
    EngineNotStarted(CarId),

    #[error("Engine start of car {0} was interrupted")]
    StartInterrupted(CarId),

    #[error("Invalid kinematics: velocity {velocity}, distance {distance}")]
    InvalidKinematics { velocity: f64, distance: f64 },

    #[error("Invalid car: {0}")]
    InvalidCar(String),

    #[error("A race is already in progress")]
    RaceInProgress,

    #[error("HTTP error {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl GarageError {
    /// Lookups that failed because the record does not exist.
    pub fn is_not_found(&self) -> bool {
        match self {
            GarageError::CarNotFound(_)
            | GarageError::WinnerNotFound(_)
            | GarageError::NoWinnerForCar(_) => true,
            GarageError::Http { status, .. } => *status == 404,
            _ => false,
        }
    }
}

impl From<serde_json::Error> for GarageError {
    fn from(err: serde_json::Error) -> Self {
        GarageError::Parse(err.to_string())
    }
}
