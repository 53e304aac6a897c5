/// Server-level tests against a database file on disk
use diet_coach::tools::{self, LogMealParams, LogWeightParams};
use diet_coach::*;
use tempfile::TempDir;

fn config(dir: &TempDir) -> Config {
    Config::new(dir.path().join("diet.db"))
}

fn meal(description: &str) -> LogMealParams {
    LogMealParams {
        description: description.to_string(),
        calories: None,
        protein: None,
        notes: None,
        timestamp: None,
    }
}

#[tokio::test]
async fn test_database_persistence() {
    let dir = TempDir::new().expect("Failed to create temp dir");

    let server = DietCoachServer::new(config(&dir))
        .await
        .expect("Failed to create first server");
    let user = server.diary().user_id().clone();
    tools::log_meal(server.storage(), &user, meal("Oatmeal with berries")).unwrap();
    tools::log_weight(
        server.storage(),
        &user,
        LogWeightParams {
            weight: 81.5,
            timestamp: None,
        },
    )
    .unwrap();

    // The diary follows the store without an explicit refresh
    assert_eq!(server.diary().logs().len(), 1);
    drop(server);

    let server = DietCoachServer::new(config(&dir))
        .await
        .expect("Failed to create second server");

    assert_eq!(server.diary().user_id(), &user);
    let logs = server.diary().logs();
    assert_eq!(logs.len(), 1);
    match &logs[0].kind {
        LogKind::Meal(details) => assert_eq!(details.description, "Oatmeal with berries"),
        other => panic!("unexpected log kind {:?}", other),
    }
    assert_eq!(server.diary().weights().len(), 1);
}

#[tokio::test]
async fn test_sign_out_starts_an_empty_diary() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let mut server = DietCoachServer::new(config(&dir)).await.unwrap();

    let first_user = server.diary().user_id().clone();
    tools::log_meal(server.storage(), &first_user, meal("Rice bowl")).unwrap();

    let session = server.sign_out().unwrap();

    assert_ne!(session.user_id, first_user);
    assert_eq!(server.diary().user_id(), &session.user_id);
    assert!(server.diary().logs().is_empty());
    // The old user's rows are still in the store
    assert_eq!(server.storage().list_logs(&first_user).unwrap().len(), 1);
}

#[tokio::test]
async fn test_app_ids_partition_one_database() {
    let dir = TempDir::new().expect("Failed to create temp dir");

    let first = DietCoachServer::new(config(&dir)).await.unwrap();
    let user = first.diary().user_id().clone();
    tools::log_meal(first.storage(), &user, meal("Soup")).unwrap();
    drop(first);

    let other = DietCoachServer::new(Config {
        app_id: "another-app".to_string(),
        ..config(&dir)
    })
    .await
    .unwrap();

    assert_ne!(other.diary().user_id(), &user);
    assert!(other.diary().logs().is_empty());
}

#[test]
fn test_storage_interface() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let storage = SqliteStorage::new(dir.path().join("diet.db"), "test-app").expect("Failed to create storage");

    let _: &dyn LogStore = &storage;
    assert_eq!(storage.app_id(), "test-app");
}
