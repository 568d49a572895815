pub mod cancel;
pub mod coordinator;
pub mod events;
pub mod kinematics;
pub mod session;
pub mod winners;

pub use coordinator::{ RaceCoordinator, RaceHandle, RaceSettings, RaceState, RaceWinner };
pub use events::{ Animation, RaceEvent };
pub use session::{ EngineRun, EngineSession, EngineState, FinishReport, SessionOutcome };
pub use winners::WinnerResolver;

/// Race times as shown to users.
pub fn format_time(seconds: f64) -> String {
    format!["{:.2}", seconds]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn times_have_two_decimals() {
        assert_eq!(format_time(4.2), "4.20");
        assert_eq!(format_time(3.14159), "3.14");
    }
}
