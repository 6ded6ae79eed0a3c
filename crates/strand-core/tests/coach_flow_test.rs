//! Integration tests for full practice sessions over on-disk SQLite stores.

use chrono::{Duration, TimeZone, Utc};
use std::sync::Arc;
use strand_core::traits::ReviewCommit;
use strand_core::{
    BalanceStatus, CatalogueNode, CefrLevel, Coach, ErrorCode, ExerciseRecord, ItemStore,
    LearnerProfile, MasteryStatus, SessionRepository, Skill, SqliteCatalogueStore,
    SqliteItemStore, Strand, StrandConfig,
};
use tempfile::TempDir;

fn config(dir: &TempDir) -> StrandConfig {
    StrandConfig::builder()
        .item_db_path(dir.path().join("items.db"))
        .catalogue_db_path(dir.path().join("catalogue.db"))
        .build()
        .unwrap()
}

fn seed_catalogue(config: &StrandConfig) {
    let catalogue = SqliteCatalogueStore::new(&config.catalogue_db_path).unwrap();
    for node in [
        CatalogueNode::new("lex.ser", "Lexeme", "ser", CefrLevel::A1),
        CatalogueNode::new("lex.estar", "Lexeme", "estar", CefrLevel::A1)
            .with_prerequisites(["lex.ser"]),
        CatalogueNode::new("cando.order_food", "CanDo", "order food", CefrLevel::A1),
        CatalogueNode::new("topic.market", "Topic", "the market", CefrLevel::A1),
        CatalogueNode::new("cando.debate", "CanDo", "debate", CefrLevel::B2),
    ] {
        catalogue.upsert_node(&node).unwrap();
    }
}

fn record(session_id: &str, node_id: &str, strand: Strand, quality: i64) -> ExerciseRecord {
    ExerciseRecord {
        session_id: session_id.to_string(),
        item_id: Some(format!("{node_id}.1")),
        node_id: node_id.to_string(),
        strand,
        skill: Skill::Speaking,
        exercise_type: None,
        quality,
        duration_seconds: 60.0,
        response_text: String::new(),
    }
}

/// A whole session: plan from the catalogue, score every exercise, close it.
#[test]
fn test_full_session_on_sqlite() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    seed_catalogue(&config);

    let coach = Coach::open(config.clone()).unwrap();
    let profile = LearnerProfile::new("ana", CefrLevel::A1);
    let t0 = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();

    let start = coach.start_session(&profile, 12.0, None, t0).unwrap();
    let planned: Vec<String> = start.plan.exercises.iter().map(|e| e.node_id.clone()).collect();
    // lex.estar waits on lex.ser; cando.debate is above the learner's level.
    assert!(planned.contains(&"lex.ser".to_string()));
    assert!(planned.contains(&"cando.order_food".to_string()));
    assert!(planned.contains(&"topic.market".to_string()));
    assert!(!planned.contains(&"lex.estar".to_string()));
    assert!(!planned.contains(&"cando.debate".to_string()));
    assert_eq!(start.plan.balance_status, BalanceStatus::Balanced);
    // Nothing mastered yet, so no fluency material.
    assert_eq!(start.plan.count_for(Strand::Fluency), 0);

    for exercise in &start.plan.exercises {
        let outcome = coach
            .record_exercise(record(&start.session_id, &exercise.node_id, exercise.strand, 4), t0)
            .unwrap();
        let update = outcome.item.unwrap();
        assert_eq!(update.next_due_at, t0 + Duration::seconds(354_240));
    }

    let summary = coach
        .end_session(&start.session_id, t0 + Duration::minutes(15))
        .unwrap();
    assert_eq!(summary.exercises_completed, start.plan.exercises.len());
    assert_eq!(summary.average_quality, Some(4.0));
    assert_eq!(summary.mastery_changes, start.plan.exercises.len());
    assert!((summary.actual_minutes - 15.0).abs() < 1e-9);

    // A second coach over the same files sees everything.
    drop(coach);
    let reopened = Coach::open(config).unwrap();
    let stats = reopened.learner_stats(t0 + Duration::hours(1)).unwrap();
    assert_eq!(stats.total_items, start.plan.exercises.len());
    assert_eq!(stats.learning_count, start.plan.exercises.len());
    assert_eq!(stats.due_count, 0);
    assert_eq!(stats.reviews_today, start.plan.exercises.len());
    assert_eq!(stats.streak_days, 1);

    // lex.ser now has a started item, which unlocks lex.estar.
    let next = reopened
        .preview_session(&profile, 12.0, None, t0 + Duration::days(1))
        .unwrap();
    assert!(next.exercises.iter().any(|e| e.node_id == "lex.estar"));

    let err = reopened
        .end_session(&start.session_id, t0 + Duration::hours(1))
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::ValInvalidInput);
}

/// Session state lives in the repository, so another process can continue it.
#[test]
fn test_session_survives_restart() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    seed_catalogue(&config);
    let profile = LearnerProfile::new("ana", CefrLevel::A1);
    let now = Utc::now();

    let session_id = {
        let coach = Coach::open(config.clone()).unwrap();
        let start = coach.start_session(&profile, 5.0, None, now).unwrap();
        coach
            .record_exercise(record(&start.session_id, "lex.ser", Strand::LanguageFocused, 5), now)
            .unwrap();
        start.session_id
    };

    let coach = Coach::open(config.clone()).unwrap();
    let outcome = coach
        .record_exercise(record(&session_id, "cando.order_food", Strand::MeaningOutput, 3), now)
        .unwrap();
    assert_eq!(outcome.progress.completed, 2);
    assert_eq!(outcome.progress.quality_sum, 8);

    let store = SqliteItemStore::new(&config.item_db_path).unwrap();
    let saved = store.load(&session_id).unwrap().unwrap();
    assert!(saved.is_active());
    assert_eq!(saved.target_minutes, 5.0);
}

/// Two writers that read the same item state: the second commit loses.
#[test]
fn test_stale_commit_is_rejected_atomically() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    seed_catalogue(&config);
    let profile = LearnerProfile::new("ana", CefrLevel::A1);
    let now = Utc::now();

    let coach = Coach::open(config.clone()).unwrap();
    let start = coach.start_session(&profile, 5.0, None, now).unwrap();
    coach
        .record_exercise(record(&start.session_id, "lex.ser", Strand::LanguageFocused, 4), now)
        .unwrap();

    let store = SqliteItemStore::new(&config.item_db_path).unwrap();
    let stale = store.get_item("lex.ser.1").unwrap().unwrap();
    let history = store.review_history("lex.ser.1").unwrap();
    let log = store.session_log(&start.session_id).unwrap();

    // Another writer moves the item on.
    coach
        .record_exercise(
            record(&start.session_id, "lex.ser", Strand::LanguageFocused, 4),
            now + Duration::days(4),
        )
        .unwrap();

    let mut lost = stale.clone();
    lost.reps += 1;
    let mut event = history[0].clone();
    event.reviewed_at = now + Duration::days(5);
    let commit = ReviewCommit {
        item: lost,
        expected_reps: stale.reps,
        create: false,
        event,
        log_entry: log[0].clone(),
    };
    let err = store.commit_review(&commit).unwrap_err();
    assert!(err.is_conflict());
    assert_eq!(err.code(), ErrorCode::TxnConflict);

    assert_eq!(store.review_history("lex.ser.1").unwrap().len(), 2);
    assert_eq!(store.session_log(&start.session_id).unwrap().len(), 2);
    assert_eq!(store.get_item("lex.ser.1").unwrap().unwrap().reps, 2);
}

/// Fluency material appears once items are mastered within the secure level.
#[test]
fn test_mastery_feeds_fluency_and_promotion() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    seed_catalogue(&config);
    let items = Arc::new(SqliteItemStore::new(&config.item_db_path).unwrap());
    let catalogue = Arc::new(SqliteCatalogueStore::new(&config.catalogue_db_path).unwrap());
    let coach = Coach::new(config, items.clone(), catalogue, items.clone()).unwrap();

    let profile = LearnerProfile::new("ana", CefrLevel::A1);
    let mut now = Utc.with_ymd_and_hms(2026, 1, 5, 9, 0, 0).unwrap();
    let start = coach.start_session(&profile, 5.0, None, now).unwrap();

    let mut status = MasteryStatus::New;
    for _ in 0..6 {
        let outcome = coach
            .record_exercise(record(&start.session_id, "lex.ser", Strand::LanguageFocused, 5), now)
            .unwrap();
        let update = outcome.item.unwrap();
        status = update.mastery_status;
        now = update.next_due_at;
    }
    assert_eq!(status, MasteryStatus::Mastered);

    let plan = coach.preview_session(&profile, 8.0, None, now).unwrap();
    assert!(plan
        .exercises
        .iter()
        .any(|e| e.strand == Strand::Fluency && e.node_id == "lex.ser"));

    // Speaking has nothing at A2 yet, so no promotion.
    let (promotions, updated) = coach.promote_secure_levels(&profile).unwrap();
    assert!(promotions.is_empty());
    assert_eq!(updated, profile);
}
