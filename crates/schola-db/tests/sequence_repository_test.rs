//! Integration tests for the Sequence repository using in-memory
//! SurrealDB.

use schola_core::repository::SequenceRepository;
use schola_db::repository::SurrealSequenceRepository;
use surrealdb::Surreal;
use surrealdb::engine::local::Mem;
use uuid::Uuid;

async fn setup() -> Surreal<surrealdb::engine::local::Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    schola_db::run_migrations(&db).await.unwrap();
    db
}

#[tokio::test]
async fn increment_without_counter_reports_none() {
    let db = setup().await;
    let repo = SurrealSequenceRepository::new(db);

    let value = repo.increment(Uuid::new_v4(), 2026).await.unwrap();
    assert!(value.is_none());
}

#[tokio::test]
async fn initialize_then_increment_is_monotonic() {
    let db = setup().await;
    let repo = SurrealSequenceRepository::new(db);
    let school_id = Uuid::new_v4();

    let seeded = repo.initialize(school_id, 2026, 4).await.unwrap();
    assert_eq!(seeded, Some(4));

    assert_eq!(repo.increment(school_id, 2026).await.unwrap(), Some(5));
    assert_eq!(repo.increment(school_id, 2026).await.unwrap(), Some(6));
    assert_eq!(repo.increment(school_id, 2026).await.unwrap(), Some(7));
}

#[tokio::test]
async fn second_initialize_loses() {
    let db = setup().await;
    let repo = SurrealSequenceRepository::new(db);
    let school_id = Uuid::new_v4();

    assert_eq!(repo.initialize(school_id, 2026, 1).await.unwrap(), Some(1));
    // The counter exists now; a late initializer must not reset it.
    assert_eq!(repo.initialize(school_id, 2026, 9).await.unwrap(), None);
    assert_eq!(repo.increment(school_id, 2026).await.unwrap(), Some(2));
}

#[tokio::test]
async fn counters_are_isolated_per_school_and_year() {
    let db = setup().await;
    let repo = SurrealSequenceRepository::new(db);
    let school_a = Uuid::new_v4();
    let school_b = Uuid::new_v4();

    repo.initialize(school_a, 2026, 1).await.unwrap();
    repo.initialize(school_a, 2027, 1).await.unwrap();
    repo.initialize(school_b, 2026, 1).await.unwrap();

    repo.increment(school_a, 2026).await.unwrap();
    repo.increment(school_a, 2026).await.unwrap();

    assert_eq!(repo.increment(school_a, 2027).await.unwrap(), Some(2));
    assert_eq!(repo.increment(school_b, 2026).await.unwrap(), Some(2));
}
