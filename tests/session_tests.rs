use std::sync::Arc;
use std::time::Duration;

use async_std::channel;
use async_std::channel::Receiver;
use async_std::task;

use garage_race::error::GarageError;
use garage_race::race::{ Animation, EngineSession, EngineState, RaceEvent, SessionOutcome };

use mocks::{ car, drain, CarScript, Drive, ScriptedGarage };

fn session(script: CarScript) -> (Arc<ScriptedGarage>, EngineSession<ScriptedGarage>, Receiver<RaceEvent>) {
    let car_id = script.car.id;
    let garage = Arc::new(ScriptedGarage::new(vec![script]));
    let (sender, receiver) = channel::unbounded();
    (garage.clone(), EngineSession::new(car_id, garage, sender, 50.0).unwrap(), receiver)
}

#[async_std::test]
async fn finish_time_is_measured() {
    let (_garage, session, events) = session(
        CarScript::new(1, 100.0, 500.0).drive(Drive::Success { after: Duration::from_millis(40) }));

    let run = session.start(car(1)).await.unwrap();
    assert_eq!(run.expected_seconds, 5.0);
    assert_eq!(session.state().await, EngineState::Running);
    assert!(session.has_pending_timer().await);

    match run.outcome.await {
        // 40ms of drive latency is 2 simulated seconds on top of the 5s run.
        SessionOutcome::Finished(report) => assert!(report.time >= 6.9, "time {}", report.time),
        other => panic!("expected a finish, got {:?}", other),
    }
    assert_eq!(session.state().await, EngineState::Finished);
    assert!(!session.has_pending_timer().await);

    let events = drain(&events);
    assert!(matches!(events[0], RaceEvent::EngineStarted { car_id: 1, .. }));
    assert!(matches!(events[1], RaceEvent::CarFinished { car_id: 1, .. }));
}

#[async_std::test]
async fn stop_cancels_the_pending_timer() {
    let (garage, session, events) = session(CarScript::new(1, 100.0, 500.0));

    let run = session.start(car(1)).await.unwrap();
    task::sleep(Duration::from_millis(10)).await;
    session.stop().await.unwrap();

    assert_eq!(session.state().await, EngineState::Stopped);
    assert_eq!(session.animation().await, Animation::AtStart);
    assert!(!session.has_pending_timer().await);
    assert_eq!(run.outcome.await, SessionOutcome::Cancelled);

    // Well past the scheduled finish: nothing fires.
    task::sleep(Duration::from_millis(150)).await;
    assert_eq!(session.state().await, EngineState::Stopped);
    assert!(!drain(&events).iter().any(|event| matches!(event, RaceEvent::CarFinished { .. })));
    assert_eq!(garage.calls().stop_engine, vec![1]);
}

#[async_std::test]
async fn stop_is_idempotent() {
    let (garage, session, _events) = session(CarScript::new(1, 100.0, 500.0));

    // Idle: nothing to stop.
    session.stop().await.unwrap();
    assert_eq!(session.state().await, EngineState::Idle);
    assert!(garage.calls().stop_engine.is_empty());

    session.start(car(1)).await.unwrap();
    session.stop().await.unwrap();
    let once = (session.state().await, session.animation().await);
    session.stop().await.unwrap();
    let twice = (session.state().await, session.animation().await);

    assert_eq!(once, twice);
    assert_eq!(garage.calls().stop_engine, vec![1]);
}

#[async_std::test]
async fn late_breakdown_after_stop_is_discarded() {
    let (_garage, session, events) = session(
        CarScript::new(1, 100.0, 500.0).drive(Drive::Breakdown { after: Duration::from_millis(40) }));

    let run = session.start(car(1)).await.unwrap();
    session.stop().await.unwrap();

    assert_eq!(run.outcome.await, SessionOutcome::Cancelled);
    assert_eq!(session.state().await, EngineState::Stopped);
    assert!(!drain(&events).iter().any(|event| matches!(event, RaceEvent::EngineBroken { .. })));
}

#[async_std::test]
async fn running_engine_cannot_be_started_again() {
    let (garage, session, _events) = session(CarScript::new(1, 100.0, 500.0).drive(Drive::Hang));

    session.start(car(1)).await.unwrap();
    assert!(matches!(session.start(car(1)).await, Err(GarageError::EngineBusy(1))));
    assert_eq!(garage.calls().start_engine, 1);
}

#[async_std::test]
async fn failed_start_leaves_session_idle() {
    let (_garage, session, events) = session(CarScript::new(1, 0.0, 500.0));

    assert!(matches!(session.start(car(1)).await, Err(GarageError::InvalidKinematics { .. })));
    assert_eq!(session.state().await, EngineState::Idle);
    assert_eq!(session.expected_seconds().await, None);
    assert!(!session.has_pending_timer().await);
    assert!(drain(&events).is_empty());

    let (_garage, unknown, _events) = session_for_unknown_car();
    assert!(matches!(unknown.start(car(9)).await, Err(GarageError::CarNotFound(9))));
    assert_eq!(unknown.state().await, EngineState::Idle);
}

fn session_for_unknown_car() -> (Arc<ScriptedGarage>, EngineSession<ScriptedGarage>, Receiver<RaceEvent>) {
    let garage = Arc::new(ScriptedGarage::new(vec![]));
    let (sender, receiver) = channel::unbounded();
    (garage.clone(), EngineSession::new(9, garage, sender, 50.0).unwrap(), receiver)
}

#[async_std::test]
async fn stop_during_start_interrupts_it() {
    let (garage, session, _events) = session(
        CarScript::new(1, 100.0, 500.0).start_delay(Duration::from_millis(30)));

    let starting = {
        let session = session.clone();
        task::spawn(async move { session.start(car(1)).await.map(|run| run.engine) })
    };
    task::sleep(Duration::from_millis(5)).await;
    session.stop().await.unwrap();

    assert!(matches!(starting.await, Err(GarageError::StartInterrupted(1))));
    assert_eq!(session.state().await, EngineState::Idle);

    // The engine started at the garage is released in the background.
    task::sleep(Duration::from_millis(20)).await;
    assert_eq!(garage.calls().stop_engine, vec![1]);
}

#[async_std::test]
async fn broken_session_can_restart() {
    let (_garage, session, _events) = session(
        CarScript::new(1, 100.0, 500.0).drive(Drive::Breakdown { after: Duration::ZERO }));

    let run = session.start(car(1)).await.unwrap();
    assert_eq!(run.outcome.await, SessionOutcome::Broken);
    assert_eq!(session.state().await, EngineState::Broken);

    let again = session.start(car(1)).await.unwrap();
    assert_eq!(again.outcome.await, SessionOutcome::Broken);

    session.stop().await.unwrap();
    assert_eq!(session.state().await, EngineState::Stopped);
    assert_eq!(session.animation().await, Animation::AtStart);
}

#[async_std::test]
async fn restart_after_interrupted_start_keeps_its_engine() {
    let (garage, session, _events) = session(
        CarScript::new(1, 100.0, 500.0)
            .first_start_delay(Duration::from_millis(30))
            .drive(Drive::Success { after: Duration::from_millis(50) }));

    let interrupted = {
        let session = session.clone();
        task::spawn(async move { session.start(car(1)).await.map(|run| run.engine) })
    };
    task::sleep(Duration::from_millis(5)).await;
    session.stop().await.unwrap();

    // Resolves only after the interrupted start released its engine.
    let run = session.start(car(1)).await.unwrap();
    assert!(matches!(interrupted.await, Err(GarageError::StartInterrupted(1))));
    assert!(matches!(run.outcome.await, SessionOutcome::Finished(_)));
    assert_eq!(garage.calls().stop_engine, vec![1]);
    assert_eq!(garage.calls().start_engine, 2);
}

#[async_std::test]
async fn concurrent_start_waits_for_the_first() {
    let (garage, session, _events) = session(
        CarScript::new(1, 100.0, 500.0).start_delay(Duration::from_millis(20)).drive(Drive::Hang));

    let first = {
        let session = session.clone();
        task::spawn(async move { session.start(car(1)).await.map(|run| run.engine) })
    };
    task::sleep(Duration::from_millis(5)).await;

    assert!(matches!(session.start(car(1)).await, Err(GarageError::EngineBusy(1))));
    assert!(first.await.is_ok());
    assert_eq!(garage.calls().start_engine, 1);
}

#[async_std::test]
async fn unrepresentable_run_is_rejected() {
    // 1e30 simulated seconds does not fit a wall-clock duration.
    let (garage, session, events) = session(CarScript::new(1, 1e-10, 1e20));

    assert!(matches!(session.start(car(1)).await, Err(GarageError::InvalidKinematics { .. })));
    assert_eq!(session.state().await, EngineState::Idle);
    assert!(drain(&events).is_empty());
    // The engine started at the garage is released.
    assert_eq!(garage.calls().stop_engine, vec![1]);
    assert!(!garage.engine_started(1));
}

#[test]
fn time_scale_must_be_positive() {
    for time_scale in [0.0, -1.0, f64::INFINITY] {
        let garage = Arc::new(ScriptedGarage::new(vec![]));
        let (sender, _receiver) = channel::unbounded();
        let created = EngineSession::new(1, garage, sender, time_scale);
        assert!(matches!(created, Err(GarageError::InvalidConfig(_))), "accepted {}", time_scale);
    }
}
