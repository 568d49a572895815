use std::sync::Arc;

use garage_race::error::GarageError;
use garage_race::race::WinnerResolver;

use mocks::ScriptedGarage;

#[async_std::test]
async fn not_found_lookup_means_no_winner_yet() {
    let garage = Arc::new(ScriptedGarage::new(vec![]).missing_winner_as_error());
    let resolver = WinnerResolver::new(garage.clone());

    let created = resolver.upsert(7, 4.2).await.unwrap();
    assert_eq!((created.wins, created.best_time), (1, 4.2));
    assert_eq!(garage.calls().create_winner.len(), 1);

    let updated = resolver.upsert(7, 3.9).await.unwrap();
    assert_eq!((updated.wins, updated.best_time), (2, 3.9));
    assert_eq!(garage.calls().update_winner.len(), 1);
}

#[async_std::test]
async fn http_not_found_lookup_creates() {
    let garage = Arc::new(ScriptedGarage::new(vec![]).fail_lookups_with(404));
    let resolver = WinnerResolver::new(garage.clone());

    assert_eq!(resolver.upsert(3, 8.0).await.unwrap().wins, 1);
}

#[async_std::test]
async fn other_lookup_failures_propagate() {
    let garage = Arc::new(ScriptedGarage::new(vec![]).fail_lookups_with(500));
    let resolver = WinnerResolver::new(garage.clone());

    assert!(matches!(resolver.upsert(3, 8.0).await, Err(GarageError::Http { status: 500, .. })));
    assert_eq!(garage.calls().winner_writes(), 0);
}

#[async_std::test]
async fn existing_record_keeps_its_better_time() {
    let garage = Arc::new(ScriptedGarage::new(vec![]));
    garage.add_winner(5, 4, 2.5);
    let resolver = WinnerResolver::new(garage.clone());

    let updated = resolver.upsert(5, 3.0).await.unwrap();
    assert_eq!((updated.wins, updated.best_time), (5, 2.5));
    assert_eq!(garage.calls().update_winner[0].0, 1);
}
