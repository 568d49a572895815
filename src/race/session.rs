use std::sync::Arc;
use std::time::{ Duration, Instant };

use async_std::channel::Sender;
use async_std::prelude::*;
use async_std::sync::Mutex;
use async_std::task;
use async_std::task::JoinHandle;

use crate::error::{ GarageError, Result };
use crate::garage::{ Car, CarId, EngineData, Garage };
use crate::race::cancel::CancelToken;
use crate::race::events::{ publish, Animation, RaceEvent };
use crate::race::kinematics::check_time_scale;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Running,
    Finished,
    Broken,
    Stopped,
}

/// A finish as measured by the session that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct FinishReport {
    pub car: Car,
    /// Measured from the drive request, in simulated seconds.
    pub time: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionOutcome {
    Finished(FinishReport),
    Broken,
    /// Stopped, restarted or abandoned before an outcome was reached.
    Cancelled,
}

/// A started engine run. Dropping `outcome` detaches the drive task.
pub struct EngineRun {
    pub engine: EngineData,
    pub expected_seconds: f64,
    pub outcome: JoinHandle<SessionOutcome>,
}

struct SessionInner {
    state: EngineState,
    car: Option<Car>,
    // Bumped on every start and stop; stale callbacks compare against it.
    run: u64,
    started_at: Option<Instant>,
    expected_seconds: Option<f64>,
    timer: Option<CancelToken>,
    // Closed once the in-flight start, including any engine release, is over.
    starting: Option<CancelToken>,
    animation: Animation,
}

impl SessionInner {
    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
    }
}

/// Marks the end of a start when dropped.
struct PendingStart(CancelToken);

impl Drop for PendingStart {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

/// Engine lifecycle of one car: idle -> running -> finished | broken | stopped.
pub struct EngineSession<G: Garage> {
    car_id: CarId,
    garage: Arc<G>,
    events: Sender<RaceEvent>,
    time_scale: f64,
    inner: Arc<Mutex<SessionInner>>,
}

impl<G: Garage> Clone for EngineSession<G> {
    fn clone(&self) -> Self {
        EngineSession {
            car_id: self.car_id,
            garage: self.garage.clone(),
            events: self.events.clone(),
            time_scale: self.time_scale,
            inner: self.inner.clone(),
        }
    }
}

impl<G: Garage> EngineSession<G> {
    pub fn new(car_id: CarId, garage: Arc<G>, events: Sender<RaceEvent>, time_scale: f64) -> Result<EngineSession<G>> {
        check_time_scale(time_scale)?;
        Ok(EngineSession::with_checked_scale(car_id, garage, events, time_scale))
    }

    pub(crate) fn with_checked_scale(
        car_id: CarId,
        garage: Arc<G>,
        events: Sender<RaceEvent>,
        time_scale: f64,
    ) -> EngineSession<G> {
        EngineSession {
            car_id,
            garage,
            events,
            time_scale,
            inner: Arc::new(Mutex::new(SessionInner {
                state: EngineState::Idle,
                car: None,
                run: 0,
                started_at: None,
                expected_seconds: None,
                timer: None,
                starting: None,
                animation: Animation::AtStart,
            })),
        }
    }

    pub fn car_id(&self) -> CarId {
        self.car_id
    }

    pub async fn state(&self) -> EngineState {
        self.inner.lock().await.state
    }

    pub async fn animation(&self) -> Animation {
        self.inner.lock().await.animation
    }

    pub async fn expected_seconds(&self) -> Option<f64> {
        self.inner.lock().await.expected_seconds
    }

    pub async fn has_pending_timer(&self) -> bool {
        self.inner.lock().await.timer.is_some()
    }

    /// Resolves once no start is in flight. An interrupted start has
    /// released its engine at the garage by then.
    pub async fn settled(&self) {
        let pending = self.inner.lock().await.starting.clone();
        if let Some(pending) = pending {
            pending.cancelled().await;
        }
    }

    /// Starts the engine and the drive request. Waits for a start already in
    /// flight to resolve first.
    ///
    /// On error the session is left exactly as it was.
    pub async fn start(&self, car: Car) -> Result<EngineRun> {
        let (run_before, _pending) = self.begin_start().await?;

        let engine = self.garage.start_engine(self.car_id).await?;
        let (expected_seconds, transition) = match self.timing(&engine) {
            Ok(timing) => timing,
            Err(err) => {
                self.release_engine().await;
                return Err(err);
            }
        };

        let mut inner = self.inner.lock().await;
        if inner.run != run_before {
            drop(inner);
            debug!["Start of car {} was interrupted by a stop", self.car_id];
            self.release_engine().await;
            return Err(GarageError::StartInterrupted(self.car_id));
        }

        let started_at = Instant::now();
        let timer = CancelToken::new();

        inner.cancel_timer();
        inner.run += 1;
        inner.state = EngineState::Running;
        inner.car = Some(car.clone());
        inner.started_at = Some(started_at);
        inner.expected_seconds = Some(expected_seconds);
        inner.timer = Some(timer.clone());
        inner.animation = Animation::Moving { started_at, duration: transition };
        let run = inner.run;
        drop(inner);

        info!["Car {} animating with velocity: {}, distance: {}, time: {:.2}s",
            self.car_id, engine.velocity, engine.distance, expected_seconds];
        publish(&self.events, RaceEvent::EngineStarted { car_id: self.car_id, engine, duration: transition });

        let session = self.clone();
        let outcome = task::spawn(async move {
            session.drive(run, car, transition, timer).await
        });

        Ok(EngineRun { engine, expected_seconds, outcome })
    }

    async fn begin_start(&self) -> Result<(u64, PendingStart)> {
        loop {
            let pending = {
                let mut inner = self.inner.lock().await;
                match inner.starting.clone() {
                    Some(pending) if !pending.is_cancelled() => pending,
                    _ => {
                        if matches!(inner.state, EngineState::Running | EngineState::Finished) {
                            return Err(GarageError::EngineBusy(self.car_id));
                        }
                        let pending = CancelToken::new();
                        inner.starting = Some(pending.clone());
                        return Ok((inner.run, PendingStart(pending)));
                    }
                }
            };
            pending.cancelled().await;
        }
    }

    /// Expected run in simulated seconds and its wall-clock animation length.
    fn timing(&self, engine: &EngineData) -> Result<(f64, Duration)> {
        let expected_seconds = engine.duration_seconds()?;
        let transition = Duration::try_from_secs_f64(expected_seconds / self.time_scale)
            .map_err(|_| GarageError::InvalidKinematics { velocity: engine.velocity, distance: engine.distance })?;
        Ok((expected_seconds, transition))
    }

    async fn drive(self, run: u64, car: Car, transition: Duration, timer: CancelToken) -> SessionOutcome {
        let success = match self.garage.drive_engine(car.id).await {
            Ok(status) => status.success,
            Err(err) => {
                warn!["Drive request for car {} failed: {}", car.id, err];
                false
            }
        };

        if timer.is_cancelled() {
            debug!["Discarding drive response of stopped car {}", car.id];
            return SessionOutcome::Cancelled;
        }
        if !success {
            return self.break_down(run).await;
        }

        let fired = async {
            task::sleep(transition).await;
            true
        }.race(async {
            timer.cancelled().await;
            false
        }).await;

        if !fired {
            return SessionOutcome::Cancelled;
        }
        self.finish(run).await
    }

    async fn break_down(&self, run: u64) -> SessionOutcome {
        let mut inner = self.inner.lock().await;
        if inner.run != run || inner.state != EngineState::Running {
            debug!["Discarding late breakdown of car {}", self.car_id];
            return SessionOutcome::Cancelled;
        }

        inner.cancel_timer();
        inner.state = EngineState::Broken;
        inner.animation = inner.animation.halt(Instant::now());
        let car = inner.car.clone();
        drop(inner);

        if let Some(car) = car {
            warn!["{}'s engine broke down!", car.name];
            publish(&self.events, RaceEvent::EngineBroken { car });
        }
        SessionOutcome::Broken
    }

    async fn finish(&self, run: u64) -> SessionOutcome {
        let mut inner = self.inner.lock().await;
        if inner.run != run || inner.state != EngineState::Running {
            return SessionOutcome::Cancelled;
        }

        let (car, started_at) = match (inner.car.clone(), inner.started_at) {
            (Some(car), Some(started_at)) => (car, started_at),
            _ => return SessionOutcome::Cancelled,
        };
        let time = started_at.elapsed().as_secs_f64() * self.time_scale;

        inner.timer = None;
        inner.state = EngineState::Finished;
        inner.animation = Animation::AtFinish;
        drop(inner);

        info!["Car {} finished in {:.2}s", car.id, time];
        publish(&self.events, RaceEvent::CarFinished { car_id: car.id, time });
        SessionOutcome::Finished(FinishReport { car, time })
    }

    /// Returns the car to the start and stops its engine at the garage.
    ///
    /// A no-op for idle or already stopped sessions.
    pub async fn stop(&self) -> Result<()> {
        if !self.halt().await {
            return Ok(());
        }
        self.garage.stop_engine(self.car_id).await
    }

    /// Local part of `stop` without telling the garage, for cars that no
    /// longer exist there.
    pub async fn abandon(&self) {
        self.halt().await;
    }

    async fn halt(&self) -> bool {
        let mut inner = self.inner.lock().await;
        // Invalidates in-flight starts and drive callbacks.
        inner.run += 1;
        if matches!(inner.state, EngineState::Idle | EngineState::Stopped) {
            return false;
        }

        inner.cancel_timer();
        inner.state = EngineState::Stopped;
        inner.started_at = None;
        inner.animation = Animation::AtStart;
        drop(inner);

        publish(&self.events, RaceEvent::EngineStopped { car_id: self.car_id });
        true
    }

    async fn release_engine(&self) {
        if let Err(err) = self.garage.stop_engine(self.car_id).await {
            debug!["Failed to release engine of car {}: {}", self.car_id, err];
        }
    }
}
