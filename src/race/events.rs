use std::time::{ Duration, Instant };

use async_std::channel::Sender;

use crate::garage::{ Car, CarId, EngineData, Winner };

/// Where a car is drawn on its track.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Animation {
    AtStart,
    Moving { started_at: Instant, duration: Duration },
    Halted { progress: f64 },
    AtFinish,
}

impl Animation {
    /// Fraction of the track covered at `now`, in `[0, 1]`.
    pub fn progress(&self, now: Instant) -> f64 {
        match *self {
            Animation::AtStart => 0.0,
            Animation::AtFinish => 1.0,
            Animation::Halted { progress } => progress,
            Animation::Moving { started_at, duration } => {
                if duration.is_zero() {
                    return 1.0;
                }
                let elapsed = now.saturating_duration_since(started_at);
                (elapsed.as_secs_f64() / duration.as_secs_f64()).min(1.0)
            }
        }
    }

    pub fn halt(&self, now: Instant) -> Animation {
        Animation::Halted { progress: self.progress(now) }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RaceEvent {
    /// The car starts moving; the transition lasts `duration` of wall-clock time.
    EngineStarted { car_id: CarId, engine: EngineData, duration: Duration },
    EngineBroken { car: Car },
    EngineStopped { car_id: CarId },
    CarFinished { car_id: CarId, time: f64 },
    StartFailed { car_id: CarId, reason: String },
    RaceFinished { car: Car, time: f64 },
    WinnerRecorded(Winner),
    WinnerNotRecorded { car_id: CarId, reason: String },
}

pub(crate) fn publish(events: &Sender<RaceEvent>, event: RaceEvent) {
    if let Err(err) = events.try_send(event) {
        debug!["Dropping race event, nobody is listening: {:?}", err.into_inner()];
    }
}
