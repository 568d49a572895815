use std::ops::Range;

use rand::Rng;

use crate::error::{ GarageError, Result };
use crate::garage::EngineData;

pub const DEFAULT_VELOCITY: Range<u32> = 50..200;
pub const DEFAULT_DISTANCE: Range<u32> = 500..1500;

/// Seconds needed to cover `distance` at `velocity`.
pub fn duration_seconds(velocity: f64, distance: f64) -> Result<f64> {
    if !velocity.is_finite() || velocity <= 0.0 || !distance.is_finite() || distance <= 0.0 {
        return Err(GarageError::InvalidKinematics { velocity, distance });
    }
    let seconds = distance / velocity;
    if !seconds.is_finite() {
        return Err(GarageError::InvalidKinematics { velocity, distance });
    }
    Ok(seconds)
}

/// Simulated seconds per wall-clock second must be positive and finite.
pub fn check_time_scale(time_scale: f64) -> Result<()> {
    if !time_scale.is_finite() || time_scale <= 0.0 {
        return Err(GarageError::InvalidConfig(format!["time_scale {} must be positive", time_scale]));
    }
    Ok(())
}

impl EngineData {
    pub fn duration_seconds(&self) -> Result<f64> {
        duration_seconds(self.velocity, self.distance)
    }
}

/// Draws whole-number engine kinematics from half-open ranges.
pub struct KinematicsGenerator<R> {
    rng: R,
    velocity: Range<u32>,
    distance: Range<u32>,
}

impl<R: Rng> KinematicsGenerator<R> {
    pub fn new(rng: R) -> KinematicsGenerator<R> {
        KinematicsGenerator { rng, velocity: DEFAULT_VELOCITY, distance: DEFAULT_DISTANCE }
    }

    /// Both ranges must be non-empty and start above zero.
    pub fn with_ranges(rng: R, velocity: Range<u32>, distance: Range<u32>) -> Result<KinematicsGenerator<R>> {
        for (name, range) in [("velocity", &velocity), ("distance", &distance)] {
            if range.start == 0 || range.is_empty() {
                return Err(GarageError::InvalidConfig(
                    format!["{} range {:?} must be non-empty and positive", name, range]));
            }
        }
        Ok(KinematicsGenerator { rng, velocity, distance })
    }

    pub fn generate(&mut self) -> EngineData {
        let velocity = self.rng.gen_range(self.velocity.clone());
        let distance = self.rng.gen_range(self.distance.clone());

        EngineData { velocity: velocity as f64, distance: distance as f64 }
    }

    pub fn rng(&mut self) -> &mut R {
        &mut self.rng
    }
}
