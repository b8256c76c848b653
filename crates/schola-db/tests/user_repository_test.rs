//! Integration tests for the User repository using in-memory SurrealDB.

use chrono::Utc;
use schola_core::error::ScholaError;
use schola_core::models::school::CreateSchool;
use schola_core::models::user::{CreateUser, StudentNumberSource, UpdateUser, UserRole};
use schola_core::repository::{SchoolRepository, UserRepository};
use schola_db::repository::{SurrealSchoolRepository, SurrealUserRepository};
use schola_db::verify_password;
use surrealdb::Surreal;
use surrealdb::engine::local::Mem;
use uuid::Uuid;

/// Helper: spin up in-memory DB, run migrations, create a school.
async fn setup() -> (Surreal<surrealdb::engine::local::Db>, Uuid) {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    schola_db::run_migrations(&db).await.unwrap();

    let school_repo = SurrealSchoolRepository::new(db.clone());
    let school = school_repo
        .create(CreateSchool {
            name: "Test School".into(),
        })
        .await
        .unwrap();

    (db, school.id)
}

fn student_input(school_id: Uuid, email: &str, number: Option<&str>) -> CreateUser {
    CreateUser {
        school_id,
        email: email.into(),
        password: "pass123".into(),
        first_name: "Test".into(),
        last_name: "Student".into(),
        role: UserRole::Student,
        is_active: true,
        student_number: number.map(Into::into),
        student_number_source: number.map(|_| StudentNumberSource::Manual),
    }
}

#[tokio::test]
async fn create_and_get_user() {
    let (db, school_id) = setup().await;
    let repo = SurrealUserRepository::new(db);

    let user = repo
        .create(CreateUser {
            school_id,
            email: "alice@example.com".into(),
            password: "SuperSecret123!".into(),
            first_name: "Alice".into(),
            last_name: "Smith".into(),
            role: UserRole::Student,
            is_active: true,
            student_number: Some("2026-001".into()),
            student_number_source: Some(StudentNumberSource::Auto),
        })
        .await
        .unwrap();

    assert_eq!(user.school_id, school_id);
    assert_eq!(user.email, "alice@example.com");
    assert_eq!(user.role, UserRole::Student);
    assert_eq!(user.student_number.as_deref(), Some("2026-001"));
    assert_eq!(user.student_number_source, Some(StudentNumberSource::Auto));
    assert!(user.is_live());

    // Password should be hashed, not stored in plaintext.
    assert_ne!(user.password_hash, "SuperSecret123!");
    assert!(user.password_hash.starts_with("$argon2id$"));

    let fetched = repo.get_by_id(school_id, user.id).await.unwrap();
    assert_eq!(fetched.id, user.id);
    assert_eq!(fetched.email, "alice@example.com");
}

#[tokio::test]
async fn password_verification() {
    let (db, school_id) = setup().await;
    let repo = SurrealUserRepository::new(db);

    let user = repo
        .create(student_input(school_id, "bob@example.com", None))
        .await
        .unwrap();

    assert!(verify_password("pass123", &user.password_hash, None).unwrap());
    assert!(!verify_password("WrongPassword", &user.password_hash, None).unwrap());
}

#[tokio::test]
async fn password_with_pepper() {
    let (db, school_id) = setup().await;
    let pepper = "server-secret-pepper".to_string();
    let repo = SurrealUserRepository::with_pepper(db, pepper.clone());

    let user = repo
        .create(student_input(school_id, "carol@example.com", None))
        .await
        .unwrap();

    assert!(verify_password("pass123", &user.password_hash, Some(&pepper)).unwrap());
    assert!(!verify_password("pass123", &user.password_hash, None).unwrap());
}

#[tokio::test]
async fn duplicate_email_rejected_across_schools() {
    let (db, school_id) = setup().await;

    let school_repo = SurrealSchoolRepository::new(db.clone());
    let other = school_repo
        .create(CreateSchool {
            name: "Other School".into(),
        })
        .await
        .unwrap();

    let repo = SurrealUserRepository::new(db);
    repo.create(student_input(school_id, "same@example.com", None))
        .await
        .unwrap();

    // Email uniqueness is global, so a different school changes nothing.
    let result = repo
        .create(student_input(other.id, "same@example.com", None))
        .await;
    assert!(matches!(result, Err(ScholaError::DuplicateEmail { .. })));
}

#[tokio::test]
async fn find_by_email_is_global() {
    let (db, school_id) = setup().await;
    let repo = SurrealUserRepository::new(db);

    let user = repo
        .create(student_input(school_id, "eve@example.com", None))
        .await
        .unwrap();

    let found = repo.find_by_email("eve@example.com").await.unwrap();
    assert_eq!(found.unwrap().id, user.id);

    let missing = repo.find_by_email("nobody@example.com").await.unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn find_by_emails_bulk() {
    let (db, school_id) = setup().await;
    let repo = SurrealUserRepository::new(db);

    for i in 0..3 {
        repo.create(student_input(
            school_id,
            &format!("bulk-{i}@example.com"),
            None,
        ))
        .await
        .unwrap();
    }

    let found = repo
        .find_by_emails(&[
            "bulk-0@example.com".into(),
            "bulk-2@example.com".into(),
            "missing@example.com".into(),
        ])
        .await
        .unwrap();
    assert_eq!(found.len(), 2);

    let empty = repo.find_by_emails(&[]).await.unwrap();
    assert!(empty.is_empty());
}

#[tokio::test]
async fn find_by_student_number_is_school_scoped() {
    let (db, school_id) = setup().await;

    let school_repo = SurrealSchoolRepository::new(db.clone());
    let other = school_repo
        .create(CreateSchool {
            name: "Other School".into(),
        })
        .await
        .unwrap();

    let repo = SurrealUserRepository::new(db);
    let user = repo
        .create(student_input(school_id, "num@example.com", Some("2026-007")))
        .await
        .unwrap();

    let found = repo
        .find_by_student_number(school_id, "2026-007")
        .await
        .unwrap();
    assert_eq!(found.unwrap().id, user.id);

    // The same number is free in another school.
    let elsewhere = repo
        .find_by_student_number(other.id, "2026-007")
        .await
        .unwrap();
    assert!(elsewhere.is_none());
}

#[tokio::test]
async fn prefix_scan_only_sees_auto_numbers() {
    let (db, school_id) = setup().await;
    let repo = SurrealUserRepository::new(db);

    repo.create(CreateUser {
        student_number: Some("2026-001".into()),
        student_number_source: Some(StudentNumberSource::Auto),
        ..student_input(school_id, "auto@example.com", None)
    })
    .await
    .unwrap();
    repo.create(CreateUser {
        student_number: Some("2026-LEGACY".into()),
        student_number_source: Some(StudentNumberSource::Manual),
        ..student_input(school_id, "manual@example.com", None)
    })
    .await
    .unwrap();

    let numbers = repo
        .list_student_numbers_with_prefix(school_id, "2026-")
        .await
        .unwrap();
    assert_eq!(numbers, vec!["2026-001".to_string()]);
}

#[tokio::test]
async fn update_user() {
    let (db, school_id) = setup().await;
    let repo = SurrealUserRepository::new(db);

    let user = repo
        .create(student_input(school_id, "frank@example.com", None))
        .await
        .unwrap();

    let updated = repo
        .update(
            school_id,
            user.id,
            UpdateUser {
                first_name: Some("Franklin".into()),
                is_active: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.first_name, "Franklin");
    assert!(!updated.is_active);
    assert_eq!(updated.email, "frank@example.com"); // unchanged
}

#[tokio::test]
async fn update_sets_and_clears_deleted_at() {
    let (db, school_id) = setup().await;
    let repo = SurrealUserRepository::new(db);

    let user = repo
        .create(student_input(school_id, "grace@example.com", None))
        .await
        .unwrap();

    let trashed = repo
        .update(
            school_id,
            user.id,
            UpdateUser {
                deleted_at: Some(Some(Utc::now())),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(!trashed.is_live());

    let restored = repo
        .update(
            school_id,
            user.id,
            UpdateUser {
                deleted_at: Some(None),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(restored.is_live());
}

#[tokio::test]
async fn school_isolation() {
    let (db, school_id) = setup().await;

    let school_repo = SurrealSchoolRepository::new(db.clone());
    let other = school_repo
        .create(CreateSchool {
            name: "Other School".into(),
        })
        .await
        .unwrap();

    let repo = SurrealUserRepository::new(db);
    let user = repo
        .create(student_input(school_id, "isolated@example.com", None))
        .await
        .unwrap();

    assert!(repo.get_by_id(school_id, user.id).await.is_ok());
    assert!(
        repo.get_by_id(other.id, user.id).await.is_err(),
        "user should not be visible in another school"
    );
}
