use std::collections::HashMap;
use std::sync::Arc;

use async_std::channel::Sender;
use async_std::sync::Mutex;
use async_std::task;
use async_std::task::JoinHandle;

use crate::error::{ GarageError, Result };
use crate::garage::{ Car, CarId, Garage };
use crate::race::events::{ publish, Animation, RaceEvent };
use crate::race::kinematics::check_time_scale;
use crate::race::session::{ EngineRun, EngineSession, EngineState, FinishReport, SessionOutcome };
use crate::race::winners::WinnerResolver;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RaceSettings {
    /// Simulated seconds per wall-clock second.
    pub time_scale: f64,
}

impl RaceSettings {
    pub fn new(time_scale: f64) -> Result<RaceSettings> {
        check_time_scale(time_scale)?;
        Ok(RaceSettings { time_scale })
    }
}

impl Default for RaceSettings {
    fn default() -> Self {
        RaceSettings { time_scale: 1.0 }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RaceWinner {
    pub car: Car,
    pub time: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RaceState {
    /// Incremented by every `start_race`.
    pub race_id: u64,
    pub is_racing: bool,
    pub winner: Option<RaceWinner>,
}

/// Tasks of one race. Dropping the handle leaves the race running.
pub struct RaceHandle {
    pub race_id: u64,
    tasks: Vec<(CarId, JoinHandle<Result<SessionOutcome>>)>,
}

impl RaceHandle {
    /// Waits for every car to finish, break down, get stopped or fail to start.
    pub async fn join(self) -> Vec<(CarId, Result<SessionOutcome>)> {
        let mut outcomes = Vec::with_capacity(self.tasks.len());
        for (car_id, handle) in self.tasks {
            outcomes.push((car_id, handle.await));
        }
        outcomes
    }
}

struct Coordinator<G: Garage> {
    garage: Arc<G>,
    resolver: WinnerResolver<G>,
    settings: RaceSettings,
    events: Sender<RaceEvent>,
    sessions: Mutex<HashMap<CarId, EngineSession<G>>>,
    state: Mutex<RaceState>,
}

/// Runs races between engine sessions and persists the first finisher.
pub struct RaceCoordinator<G: Garage> {
    inner: Arc<Coordinator<G>>,
}

impl<G: Garage> Clone for RaceCoordinator<G> {
    fn clone(&self) -> Self {
        RaceCoordinator { inner: self.inner.clone() }
    }
}

impl<G: Garage> RaceCoordinator<G> {
    pub fn new(garage: Arc<G>, settings: RaceSettings, events: Sender<RaceEvent>) -> Result<RaceCoordinator<G>> {
        check_time_scale(settings.time_scale)?;
        Ok(RaceCoordinator {
            inner: Arc::new(Coordinator {
                resolver: WinnerResolver::new(garage.clone()),
                garage,
                settings,
                events,
                sessions: Mutex::new(HashMap::new()),
                state: Mutex::new(RaceState::default()),
            }),
        })
    }

    pub async fn race_state(&self) -> RaceState {
        self.inner.state.lock().await.clone()
    }

    pub async fn engine_state(&self, car_id: CarId) -> Option<EngineState> {
        match self.session(car_id).await {
            Some(session) => Some(session.state().await),
            None => None,
        }
    }

    pub async fn animation(&self, car_id: CarId) -> Option<Animation> {
        match self.session(car_id).await {
            Some(session) => Some(session.animation().await),
            None => None,
        }
    }

    async fn session(&self, car_id: CarId) -> Option<EngineSession<G>> {
        self.inner.sessions.lock().await.get(&car_id).cloned()
    }

    async fn session_for(&self, car_id: CarId) -> EngineSession<G> {
        let mut sessions = self.inner.sessions.lock().await;
        sessions.entry(car_id)
            .or_insert_with(|| EngineSession::with_checked_scale(
                car_id,
                self.inner.garage.clone(),
                self.inner.events.clone(),
                self.inner.settings.time_scale))
            .clone()
    }

    /// Starts every car at once. A car that fails to start is reported and
    /// left out; the others race on.
    pub async fn start_race(&self, cars: Vec<Car>) -> Result<RaceHandle> {
        let race_id = {
            let mut state = self.inner.state.lock().await;
            if state.is_racing {
                return Err(GarageError::RaceInProgress);
            }
            state.race_id += 1;
            state.is_racing = true;
            state.winner = None;
            state.race_id
        };

        info!["Starting race {} with {} cars", race_id, cars.len()];

        let mut tasks = Vec::with_capacity(cars.len());
        for car in cars {
            let car_id = car.id;
            let session = self.session_for(car_id).await;
            let coordinator = self.clone();
            tasks.push((car_id, task::spawn(async move {
                coordinator.run_car(race_id, session, car).await
            })));
        }

        Ok(RaceHandle { race_id, tasks })
    }

    /// Races the cars of one garage page.
    pub async fn race_page(&self, page: usize, page_size: usize) -> Result<RaceHandle> {
        let cars = self.inner.garage.list_cars(page, page_size).await?;
        self.start_race(cars.items).await
    }

    async fn run_car(&self, race_id: u64, session: EngineSession<G>, car: Car) -> Result<SessionOutcome> {
        let car_id = car.id;
        let run = match session.start(car).await {
            Ok(run) => run,
            Err(err) => {
                warn!["Error starting engine for car {} during race: {}", car_id, err];
                publish(&self.inner.events, RaceEvent::StartFailed { car_id, reason: err.to_string() });
                return Err(err);
            }
        };

        let outcome = run.outcome.await;
        if let SessionOutcome::Finished(report) = &outcome {
            self.report_finish(race_id, report.clone()).await;
        }
        Ok(outcome)
    }

    /// First legitimate finisher of the current race wins; everything else
    /// is discarded.
    async fn report_finish(&self, race_id: u64, report: FinishReport) {
        let car_id = report.car.id;
        {
            let mut state = self.inner.state.lock().await;
            if !self.inner.sessions.lock().await.contains_key(&car_id) {
                debug!["Ignoring finish of removed car {}", car_id];
                return;
            }
            if state.race_id != race_id || !state.is_racing || state.winner.is_some() {
                debug!["Discarding finish of car {} in {:.2}s", car_id, report.time];
                return;
            }
            state.winner = Some(RaceWinner { car: report.car.clone(), time: report.time });
        }

        info!["Race finished: Car {} with time {:.2}s", car_id, report.time];
        publish(&self.inner.events, RaceEvent::RaceFinished { car: report.car, time: report.time });

        match self.inner.resolver.upsert(car_id, report.time).await {
            Ok(winner) => {
                info!["Successfully recorded winner: {:?}", winner];
                publish(&self.inner.events, RaceEvent::WinnerRecorded(winner));
            }
            Err(err) => {
                error!["Failed to record winner: {}", err];
                publish(&self.inner.events, RaceEvent::WinnerNotRecorded { car_id, reason: err.to_string() });
            }
        }
    }

    /// Ends the race and stops every engine. Stop failures are collected,
    /// never fatal. Returns once no start of the old race can still reach
    /// the garage.
    pub async fn reset_race(&self) -> Vec<(CarId, GarageError)> {
        {
            let mut state = self.inner.state.lock().await;
            state.is_racing = false;
            state.winner = None;
        }

        let sessions: Vec<EngineSession<G>> = self.inner.sessions.lock().await
            .drain()
            .map(|(_, session)| session)
            .collect();

        let stops: Vec<_> = sessions.into_iter()
            .map(|session| task::spawn(async move {
                let stopped = session.stop().await;
                session.settled().await;
                (session.car_id(), stopped)
            }))
            .collect();

        let mut failures = Vec::new();
        for stop in stops {
            let (car_id, result) = stop.await;
            if let Err(err) = result {
                warn!["Error stopping engine for car {} during reset: {}", car_id, err];
                failures.push((car_id, err));
            }
        }
        failures
    }

    /// Starts a single car outside of any race.
    pub async fn start_engine(&self, car: Car) -> Result<EngineRun> {
        self.session_for(car.id).await.start(car).await
    }

    pub async fn stop_engine(&self, car_id: CarId) -> Result<()> {
        match self.session(car_id).await {
            Some(session) => session.stop().await,
            None => Ok(()),
        }
    }

    /// Forgets a deleted car. Its in-flight run is cancelled and any result
    /// it still produces is ignored.
    pub async fn remove_car(&self, car_id: CarId) {
        // Same lock order as `report_finish`: a finish either wins before the
        // removal or is ignored.
        let removed = {
            let _state = self.inner.state.lock().await;
            self.inner.sessions.lock().await.remove(&car_id)
        };
        if let Some(session) = removed {
            session.abandon().await;
        }
    }
}
