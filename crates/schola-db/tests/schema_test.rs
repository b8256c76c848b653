//! Integration tests for schema initialization using in-memory SurrealDB.

use surrealdb::Surreal;
use surrealdb::engine::local::Mem;

#[tokio::test]
async fn schema_migration_applies_successfully() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();

    schola_db::run_migrations(&db).await.unwrap();

    // Verify that key tables exist by querying INFO FOR DB.
    let mut result = db.query("INFO FOR DB").await.unwrap();
    let info: Option<surrealdb_types::Value> = result.take(0).unwrap();
    let info = info.expect("INFO FOR DB should return a value");
    let info_str = format!("{:?}", info);

    assert!(info_str.contains("school"), "missing school table");
    assert!(info_str.contains("user"), "missing user table");
    assert!(info_str.contains("access_code"), "missing access_code table");
    assert!(info_str.contains("user_trash"), "missing user_trash table");
    assert!(
        info_str.contains("student_sequence"),
        "missing student_sequence table"
    );
    assert!(info_str.contains("class"), "missing class table");
    assert!(info_str.contains("classroom"), "missing classroom table");
    assert!(
        info_str.contains("class_enrollment"),
        "missing class_enrollment table"
    );
    assert!(
        info_str.contains("class_assignment"),
        "missing class_assignment table"
    );
    assert!(
        info_str.contains("classroom_student"),
        "missing classroom_student table"
    );
    assert!(
        info_str.contains("classroom_teacher"),
        "missing classroom_teacher table"
    );

    // Verify migration was recorded.
    assert!(info_str.contains("_migration"), "missing _migration table");
}

#[tokio::test]
async fn migration_is_idempotent() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();

    // Run twice — should not fail.
    schola_db::run_migrations(&db).await.unwrap();
    schola_db::run_migrations(&db).await.unwrap();

    // Both schema versions should be recorded exactly once.
    let mut result = db.query("SELECT * FROM _migration").await.unwrap();
    let records: Vec<surrealdb_types::Value> = result.take(0).unwrap();
    assert_eq!(records.len(), 2, "expected exactly two migration records");
}

#[tokio::test]
async fn unique_index_prevents_duplicate_emails() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();

    schola_db::run_migrations(&db).await.unwrap();

    db.query(
        "CREATE user SET \
         school_id = 's1', \
         email = 'same@example.com', \
         password_hash = 'x', \
         first_name = 'A', \
         last_name = 'B', \
         role = 'Teacher', \
         is_active = true",
    )
    .await
    .unwrap()
    .check()
    .unwrap();

    // Same email under a different school must still be rejected.
    let result = db
        .query(
            "CREATE user SET \
             school_id = 's2', \
             email = 'same@example.com', \
             password_hash = 'x', \
             first_name = 'C', \
             last_name = 'D', \
             role = 'Student', \
             is_active = true",
        )
        .await
        .unwrap()
        .check();

    assert!(result.is_err(), "duplicate email should be rejected");
}

#[tokio::test]
async fn unique_index_prevents_duplicate_codes() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();

    schola_db::run_migrations(&db).await.unwrap();

    db.query(
        "CREATE access_code SET \
         code = 'ABCD2345', \
         school_id = 's1', \
         created_by_id = 'u1', \
         is_used = false",
    )
    .await
    .unwrap()
    .check()
    .unwrap();

    let result = db
        .query(
            "CREATE access_code SET \
             code = 'ABCD2345', \
             school_id = 's1', \
             created_by_id = 'u2', \
             is_used = false",
        )
        .await
        .unwrap()
        .check();

    assert!(result.is_err(), "duplicate code should be rejected");
}
