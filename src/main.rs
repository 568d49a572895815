#[macro_use] extern crate log;
extern crate env_logger;

use std::sync::Arc;

use async_std::task;

use garage_race::config::Config;
use garage_race::garage::in_memory::InMemoryGarage;
use garage_race::garage::{ Garage, WinnerQuery };
use garage_race::race::{ format_time, RaceCoordinator, RaceEvent };
use garage_race::Result;

fn describe(event: &RaceEvent) -> String {
    match event {
        RaceEvent::EngineStarted { car_id, engine, duration } =>
            format!["Car {} started (velocity {}, distance {}, {:.2}s on screen)",
                car_id, engine.velocity, engine.distance, duration.as_secs_f64()],
        RaceEvent::EngineBroken { car } => format!["{}'s engine broke down!", car.name],
        RaceEvent::EngineStopped { car_id } => format!["Car {} stopped", car_id],
        RaceEvent::CarFinished { car_id, time } => format!["Car {} finished in {}s", car_id, format_time(*time)],
        RaceEvent::StartFailed { car_id, reason } => format!["Failed to start engine for car {}: {}", car_id, reason],
        RaceEvent::RaceFinished { car, time } => format!["{} won the race in {}s!", car.name, format_time(*time)],
        RaceEvent::WinnerRecorded(winner) =>
            format!["Car {} now has {} wins, best time {}s", winner.car_id, winner.wins, format_time(winner.best_time)],
        RaceEvent::WinnerNotRecorded { car_id, reason } => format!["Could not record win of car {}: {}", car_id, reason],
    }
}

async fn run(config: Config) -> Result<()> {
    let garage = Arc::new(InMemoryGarage::with_demo_cars(
        &config.engine, config.garage.seed, config.race.time_scale)?);

    let (sender, receiver) = async_std::channel::unbounded();
    let event_logger = task::spawn(async move {
        while let Ok(event) = receiver.recv().await {
            info!["{}", describe(&event)];
        }
    });

    let coordinator = RaceCoordinator::new(garage.clone(), config.race, sender)?;
    let race = coordinator.race_page(1, config.garage.page_size).await?;
    race.join().await;

    let state = coordinator.race_state().await;
    if state.winner.is_none() {
        info!["Nobody reached the finish line"];
    }
    for (car_id, err) in coordinator.reset_race().await {
        warn!["Car {} did not stop cleanly: {}", car_id, err];
    }
    drop(coordinator);
    event_logger.await;

    let winners = garage.list_winners(WinnerQuery {
        limit: config.garage.winners_page_size,
        ..WinnerQuery::default()
    }).await?;
    println!("{}", serde_json::to_string_pretty(&winners)?);
    Ok(())
}

fn main() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let result = task::block_on(async {
        let config = match std::env::args().nth(1) {
            Some(path) => Config::load(&path).await?,
            None => Config::default(),
        };
        run(config).await
    });

    if let Err(err) = result {
        error!["{}", err];
        std::process::exit(1);
    }
}
