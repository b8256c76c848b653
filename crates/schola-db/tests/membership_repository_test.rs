//! Integration tests for the Membership repository using in-memory
//! SurrealDB.

use schola_core::models::membership::{CreateClass, CreateClassroom};
use schola_core::models::school::CreateSchool;
use schola_core::repository::{MembershipRepository, SchoolRepository};
use schola_db::repository::{SurrealMembershipRepository, SurrealSchoolRepository};
use surrealdb::Surreal;
use surrealdb::engine::local::Mem;
use uuid::Uuid;

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

#[tokio::test]
async fn create_and_find_targets() {
    let (db, school_id) = setup().await;
    let repo = SurrealMembershipRepository::new(db);

    let class = repo
        .create_class(CreateClass {
            school_id,
            name: "7B Math".into(),
        })
        .await
        .unwrap();
    let classroom = repo
        .create_classroom(CreateClassroom {
            school_id,
            name: "Room 12".into(),
        })
        .await
        .unwrap();

    assert!(repo.find_class(school_id, class.id).await.unwrap().is_some());
    assert!(
        repo.find_classroom(school_id, classroom.id)
            .await
            .unwrap()
            .is_some()
    );
    assert!(
        repo.find_class(school_id, Uuid::new_v4())
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn targets_are_school_scoped() {
    let (db, school_id) = setup().await;

    let school_repo = SurrealSchoolRepository::new(db.clone());
    let other = school_repo
        .create(CreateSchool {
            name: "Other School".into(),
        })
        .await
        .unwrap();

    let repo = SurrealMembershipRepository::new(db);
    let class = repo
        .create_class(CreateClass {
            school_id,
            name: "7B Math".into(),
        })
        .await
        .unwrap();

    assert!(repo.find_class(other.id, class.id).await.unwrap().is_none());
}

#[tokio::test]
async fn repeated_attachment_reports_false() {
    let (db, school_id) = setup().await;
    let repo = SurrealMembershipRepository::new(db);

    let class = repo
        .create_class(CreateClass {
            school_id,
            name: "7B Math".into(),
        })
        .await
        .unwrap();
    let student_id = Uuid::new_v4();

    assert!(
        repo.enroll_student_in_class(class.id, student_id)
            .await
            .unwrap()
    );
    assert!(
        !repo
            .enroll_student_in_class(class.id, student_id)
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn all_four_association_tables_attach() {
    let (db, school_id) = setup().await;
    let repo = SurrealMembershipRepository::new(db);

    let class = repo
        .create_class(CreateClass {
            school_id,
            name: "7B Math".into(),
        })
        .await
        .unwrap();
    let classroom = repo
        .create_classroom(CreateClassroom {
            school_id,
            name: "Room 12".into(),
        })
        .await
        .unwrap();
    let student_id = Uuid::new_v4();
    let teacher_id = Uuid::new_v4();

    assert!(
        repo.enroll_student_in_class(class.id, student_id)
            .await
            .unwrap()
    );
    assert!(
        repo.assign_teacher_to_class(class.id, teacher_id)
            .await
            .unwrap()
    );
    assert!(
        repo.add_student_to_classroom(classroom.id, student_id)
            .await
            .unwrap()
    );
    assert!(
        repo.add_teacher_to_classroom(classroom.id, teacher_id)
            .await
            .unwrap()
    );
}
