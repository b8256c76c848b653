//! Integration tests for teacher invitation codes against in-memory
//! SurrealDB.

use chrono::Utc;
use schola_core::error::ScholaError;
use schola_core::models::access_code::CreateAccessCode;
use schola_core::models::school::CreateSchool;
use schola_core::models::user::{CreateUser, UserRole};
use schola_core::repository::{AccessCodeRepository, SchoolRepository, UserRepository};
use schola_db::repository::{
    SurrealAccessCodeRepository, SurrealSchoolRepository, SurrealUserRepository,
};
use schola_roster::{AccessCodeService, ActivateTeacherInput, InviteTeacherInput, RosterConfig};
use surrealdb::Surreal;
use surrealdb::engine::local::Mem;
use uuid::Uuid;

type Db = surrealdb::engine::local::Db;

async fn setup() -> (Surreal<Db>, Uuid, Uuid) {
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

    let user_repo = SurrealUserRepository::new(db.clone());
    let admin = user_repo
        .create(CreateUser {
            school_id: school.id,
            email: "admin@example.com".into(),
            password: "admin-pass".into(),
            first_name: "Ada".into(),
            last_name: "Min".into(),
            role: UserRole::Admin,
            is_active: true,
            student_number: None,
            student_number_source: None,
        })
        .await
        .unwrap();

    (db, school.id, admin.id)
}

fn service(
    db: &Surreal<Db>,
) -> AccessCodeService<SurrealAccessCodeRepository<Db>, SurrealUserRepository<Db>> {
    AccessCodeService::new(
        SurrealAccessCodeRepository::new(db.clone()),
        SurrealUserRepository::new(db.clone()),
        RosterConfig::default(),
    )
}

fn invite(school_id: Uuid, admin_id: Uuid, email: &str) -> InviteTeacherInput {
    InviteTeacherInput {
        school_id,
        invited_by: admin_id,
        email: email.into(),
        first_name: "Tea".into(),
        last_name: "Cher".into(),
    }
}

#[tokio::test]
async fn invite_issues_bound_code_and_inactive_identity() {
    let (db, school_id, admin_id) = setup().await;
    let service = service(&db);

    let issued = service
        .invite_teacher(invite(school_id, admin_id, "new.teacher@example.com"))
        .await
        .unwrap();

    assert_eq!(issued.user.role, UserRole::Teacher);
    assert!(!issued.user.is_active);
    assert_eq!(issued.code.invited_user_id, Some(issued.user.id));
    assert_eq!(issued.code.code.len(), 8);
    assert!(issued.code.is_available(Utc::now()));
    // Seven-day expiry window.
    assert!(issued.code.expires_at.is_some());
}

#[tokio::test]
async fn double_invite_is_a_duplicate_email() {
    let (db, school_id, admin_id) = setup().await;
    let service = service(&db);

    service
        .invite_teacher(invite(school_id, admin_id, "once@example.com"))
        .await
        .unwrap();

    let result = service
        .invite_teacher(invite(school_id, admin_id, "Once@Example.com"))
        .await;
    assert!(matches!(result, Err(ScholaError::DuplicateEmail { .. })));
}

#[tokio::test]
async fn verify_reports_school_without_consuming() {
    let (db, school_id, admin_id) = setup().await;
    let service = service(&db);

    let issued = service
        .invite_teacher(invite(school_id, admin_id, "check@example.com"))
        .await
        .unwrap();

    assert_eq!(service.verify(&issued.code.code).await.unwrap(), school_id);
    // Still available afterwards.
    assert_eq!(service.verify(&issued.code.code).await.unwrap(), school_id);

    let unknown = service.verify("NOSUCHCD").await;
    assert!(matches!(unknown, Err(ScholaError::InvalidOrExpiredCode)));
}

#[tokio::test]
async fn activation_consumes_bound_code_exactly_once() {
    let (db, school_id, admin_id) = setup().await;
    let service = service(&db);

    let issued = service
        .invite_teacher(invite(school_id, admin_id, "join@example.com"))
        .await
        .unwrap();

    let activated = service
        .activate(ActivateTeacherInput {
            code: issued.code.code.clone(),
            email: "Join@Example.com".into(),
            password: "RealPass1!".into(),
            first_name: "Tina".into(),
            last_name: "Cher".into(),
        })
        .await
        .unwrap();

    assert!(activated.is_active);
    assert_eq!(activated.id, issued.user.id);
    assert!(schola_db::verify_password("RealPass1!", &activated.password_hash, None).unwrap());

    let again = service
        .activate(ActivateTeacherInput {
            code: issued.code.code,
            email: "join@example.com".into(),
            password: "Other".into(),
            first_name: "X".into(),
            last_name: "Y".into(),
        })
        .await;
    assert!(matches!(again, Err(ScholaError::InvalidOrExpiredCode)));
}

#[tokio::test]
async fn activation_with_wrong_email_leaves_code_unspent() {
    let (db, school_id, admin_id) = setup().await;
    let service = service(&db);

    let issued = service
        .invite_teacher(invite(school_id, admin_id, "intended@example.com"))
        .await
        .unwrap();

    let result = service
        .activate(ActivateTeacherInput {
            code: issued.code.code.clone(),
            email: "impostor@example.com".into(),
            password: "pass".into(),
            first_name: "Im".into(),
            last_name: "Postor".into(),
        })
        .await;
    assert!(matches!(result, Err(ScholaError::InvalidOrExpiredCode)));

    // The intended invitee can still use it.
    assert!(service.verify(&issued.code.code).await.is_ok());
}

#[tokio::test]
async fn concurrent_activation_spends_the_code_once() {
    let (db, school_id, admin_id) = setup().await;
    let service = service(&db);

    let issued = service
        .invite_teacher(invite(school_id, admin_id, "race@example.com"))
        .await
        .unwrap();

    let mut handles = Vec::new();
    for i in 0..6 {
        let service = service.clone();
        let code = issued.code.code.clone();
        handles.push(tokio::spawn(async move {
            service
                .activate(ActivateTeacherInput {
                    code,
                    email: "race@example.com".into(),
                    password: format!("RacePass{i}!"),
                    first_name: "Ra".into(),
                    last_name: "Cer".into(),
                })
                .await
        }));
    }

    let mut activated = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => activated += 1,
            // Losing the race must be indistinguishable from a spent
            // or unknown code.
            Err(ScholaError::InvalidOrExpiredCode) => {}
            Err(e) => panic!("loser saw unexpected error: {e}"),
        }
    }
    assert_eq!(activated, 1, "exactly one consumer may spend the code");
}

#[tokio::test]
async fn unbound_code_registers_a_new_teacher() {
    let (db, school_id, admin_id) = setup().await;
    let codes = SurrealAccessCodeRepository::new(db.clone());
    let service = service(&db);

    codes
        .create(CreateAccessCode {
            code: "LEGACY23".into(),
            school_id,
            created_by_id: admin_id,
            invited_user_id: None,
            expires_at: None,
        })
        .await
        .unwrap();

    let registered = service
        .activate(ActivateTeacherInput {
            code: "LEGACY23".into(),
            email: "self.reg@example.com".into(),
            password: "FirstPass!".into(),
            first_name: "Self".into(),
            last_name: "Reg".into(),
        })
        .await
        .unwrap();

    assert_eq!(registered.role, UserRole::Teacher);
    assert!(registered.is_active);
    assert_eq!(registered.school_id, school_id);

    // An existing email cannot ride an unbound code.
    codes
        .create(CreateAccessCode {
            code: "LEGACY24".into(),
            school_id,
            created_by_id: admin_id,
            invited_user_id: None,
            expires_at: None,
        })
        .await
        .unwrap();
    let result = service
        .activate(ActivateTeacherInput {
            code: "LEGACY24".into(),
            email: "self.reg@example.com".into(),
            password: "pass".into(),
            first_name: "Self".into(),
            last_name: "Reg".into(),
        })
        .await;
    assert!(matches!(result, Err(ScholaError::DuplicateEmail { .. })));
}
