/// Basic unit tests to verify core functionality
use chrono::{TimeZone, Utc};
use diet_coach::coach::{CoachError, FeatureState, Recipe, RECIPE_NOTE};
use diet_coach::tools::{parse_date, parse_timestamp};
use diet_coach::*;
use tempfile::NamedTempFile;

#[test]
fn test_draft_validation() {
    assert!(matches!(
        LogDraft::meal("   ", None, None, ""),
        Err(DomainError::EmptyMealDescription)
    ));
    assert!(LogDraft::water(0.0, "").is_err());
    assert!(LogDraft::feelings(1, 5, 6, "").is_err());
    assert!(LogDraft::feelings(1, 5, 3, "").is_ok());
    assert!(WeightDraft::new(72.0).is_ok());
}

#[test]
fn test_daily_summaries_are_date_ordered() {
    let later = LogRecord::from_existing(
        LogId::new(),
        Utc.with_ymd_and_hms(2024, 3, 2, 8, 0, 0).unwrap(),
        String::new(),
        LogKind::Water(WaterDetails { amount: 250.0 }),
    );
    let earlier = LogRecord::from_existing(
        LogId::new(),
        Utc.with_ymd_and_hms(2024, 3, 1, 23, 30, 0).unwrap(),
        String::new(),
        LogKind::Water(WaterDetails { amount: 500.0 }),
    );

    let days = daily_summaries(&[later, earlier]);

    assert_eq!(days.len(), 2);
    assert_eq!(days[0].date.to_string(), "2024-03-01");
    assert_eq!(days[0].total_water_ml(), 500.0);
    assert!(!days[1].has_meals_or_feelings());
}

#[test]
fn test_recipe_prefills_meal() {
    let recipe = Recipe {
        recipe_name: "Turkey rice bowl".to_string(),
        calories: Some("~600 kcal".to_string()),
        protein: Some("~40g protein".to_string()),
        description: String::new(),
        ingredients: vec![],
        recipe: vec![],
    };

    let draft = recipe.to_meal_draft(None).unwrap();
    assert_eq!(draft.notes, RECIPE_NOTE);
    match draft.kind {
        LogKind::Meal(meal) => assert_eq!(meal.calories.as_deref(), Some("~600 kcal")),
        other => panic!("unexpected kind {:?}", other),
    }
}

#[test]
fn test_input_parsing_helpers() {
    let at = parse_timestamp("2024-05-01T10:00:00+02:00").unwrap();
    assert_eq!(at, Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap());
    assert!(parse_date("2024-13-01").is_err());
}

#[test]
fn test_feature_state_from_failed_request() {
    let state: FeatureState<String> = FeatureState::from_result(Err(CoachError::Domain(
        DomainError::EmptyMealDescription,
    )));
    assert_eq!(state, FeatureState::Failed("Please describe your meal.".to_string()));
}

#[test]
fn test_storage_creation() {
    let temp_file = NamedTempFile::new().expect("Failed to create temp file");
    let storage = SqliteStorage::new(temp_file.path().to_path_buf(), "test-app");
    assert!(storage.is_ok());
}

#[test]
fn test_anonymous_sign_in_on_file_database() {
    let temp_file = NamedTempFile::new().expect("Failed to create temp file");
    let storage = SqliteStorage::new(temp_file.path().to_path_buf(), "test-app").unwrap();
    let auth = AnonymousAuth::new(storage);

    let session = auth.sign_in().unwrap();
    assert_eq!(auth.sign_in().unwrap(), session);
}
