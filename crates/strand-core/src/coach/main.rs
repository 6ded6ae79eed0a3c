//! Session orchestration over the stores and the planning core.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use super::progress::{exercise_feedback, session_progress};
use super::stats::{learner_stats, promotions};
use super::types::{
    ExerciseOutcome, ExerciseRecord, ItemUpdate, LearnerStats, Promotion, SessionStart,
    SessionSummary,
};
use crate::balance::{compute_balance, preference_from_goal, window_start};
use crate::cognitive::{balance_status, MasteryClassifier, MemoryModel};
use crate::config::StrandConfig;
use crate::error::{StrandError, StrandResult};
use crate::planner::{CandidateCatalogue, SessionAllocator};
use crate::store::{SqliteCatalogueStore, SqliteItemStore};
use crate::traits::{CatalogueStore, ItemStore, ReviewCommit, SessionRepository};
use crate::types::{
    Item, LearnerProfile, PracticeLogEntry, Quality, ReviewEvent, SessionPlan, SessionRecord,
    StrandBalance, StrandDetail, StrandPreference,
};

struct CachedPreview {
    plan: SessionPlan,
    minutes: f64,
    preference: Option<StrandPreference>,
    created_at: DateTime<Utc>,
}

/// Runs practice sessions for learners.
///
/// All session state goes through the [`SessionRepository`]; only previewed
/// plans are held in memory, and only for `preview_ttl_minutes`.
pub struct Coach {
    config: StrandConfig,
    items: Arc<dyn ItemStore>,
    catalogue: Arc<dyn CatalogueStore>,
    sessions: Arc<dyn SessionRepository>,
    candidates: CandidateCatalogue,
    model: MemoryModel,
    allocator: SessionAllocator,
    classifier: MasteryClassifier,
    previews: Mutex<HashMap<String, CachedPreview>>,
}

impl Coach {
    /// Create a coach over the given stores.
    pub fn new(
        config: StrandConfig,
        items: Arc<dyn ItemStore>,
        catalogue: Arc<dyn CatalogueStore>,
        sessions: Arc<dyn SessionRepository>,
    ) -> StrandResult<Self> {
        let model = MemoryModel::from_config(&config)?;
        let allocator = SessionAllocator::new(&config)?;
        let classifier = MasteryClassifier::new(config.mastery.clone());
        let candidates = CandidateCatalogue::new(
            items.clone(),
            catalogue.clone(),
            config.planner.clone(),
            config.mastery.clone(),
        );

        Ok(Self {
            config,
            items,
            catalogue,
            sessions,
            candidates,
            model,
            allocator,
            classifier,
            previews: Mutex::new(HashMap::new()),
        })
    }

    /// Open the SQLite databases named in the configuration.
    ///
    /// Sessions are stored alongside items.
    pub fn open(config: StrandConfig) -> StrandResult<Self> {
        let items = Arc::new(SqliteItemStore::new(&config.item_db_path)?);
        let catalogue = Arc::new(SqliteCatalogueStore::new(&config.catalogue_db_path)?);
        tracing::info!(
            item_db = %config.item_db_path.display(),
            catalogue_db = %config.catalogue_db_path.display(),
            "Opened strand stores"
        );
        Self::new(config, items.clone(), catalogue, items)
    }

    pub fn config(&self) -> &StrandConfig {
        &self.config
    }

    /// Strand balance over the configured lookback window.
    pub fn current_balance(&self, learner_id: &str, now: DateTime<Utc>) -> StrandResult<StrandBalance> {
        let window = self.allocator.balance_config().lookback;
        let history = self.items.practice_log(learner_id, window_start(window, now))?;
        Ok(compute_balance(&history, window, now))
    }

    /// Translate a free-text goal into a strand preference, damping strands
    /// the learner already over-practices.
    pub fn preference_for_goal(
        &self,
        learner_id: &str,
        goal: &str,
        now: DateTime<Utc>,
    ) -> StrandResult<StrandPreference> {
        let balance = self.current_balance(learner_id, now)?;
        Ok(preference_from_goal(goal, Some(&balance)))
    }

    /// Plan a session without starting it.
    ///
    /// The plan is cached so a matching `start_session` within the TTL runs
    /// exactly what was shown.
    pub fn preview_session(
        &self,
        profile: &LearnerProfile,
        minutes: f64,
        preference: Option<&StrandPreference>,
        now: DateTime<Utc>,
    ) -> StrandResult<SessionPlan> {
        let plan = self.plan(profile, minutes, preference, now)?;

        let mut previews = self
            .previews
            .lock()
            .map_err(|e| StrandError::Internal(e.to_string()))?;
        previews.insert(
            profile.learner_id.clone(),
            CachedPreview {
                plan: plan.clone(),
                minutes,
                preference: preference.cloned(),
                created_at: now,
            },
        );
        Ok(plan)
    }

    /// Start a session and persist its record.
    pub fn start_session(
        &self,
        profile: &LearnerProfile,
        minutes: f64,
        preference: Option<&StrandPreference>,
        now: DateTime<Utc>,
    ) -> StrandResult<SessionStart> {
        let plan = match self.take_preview(&profile.learner_id, minutes, preference, now)? {
            Some(plan) => plan,
            None => self.plan(profile, minutes, preference, now)?,
        };

        let record = SessionRecord {
            session_id: Uuid::new_v4().to_string(),
            learner_id: profile.learner_id.clone(),
            started_at: now,
            ended_at: None,
            target_minutes: minutes,
            planned: plan.exercises.clone(),
            preference: preference.cloned(),
            balance_status: plan.balance_status,
            notes: plan.notes.clone(),
        };
        self.sessions.save(&record)?;

        tracing::info!(
            session_id = %record.session_id,
            learner_id = %record.learner_id,
            minutes,
            exercises = plan.exercises.len(),
            status = %plan.balance_status,
            "Session started"
        );

        Ok(SessionStart {
            session_id: record.session_id,
            guidance: plan.balance_status.guidance().to_string(),
            plan,
        })
    }

    /// Record one graded exercise.
    ///
    /// The item update, its review event and the practice-log entry are
    /// committed together; on any failure nothing is written.
    pub fn record_exercise(
        &self,
        record: ExerciseRecord,
        now: DateTime<Utc>,
    ) -> StrandResult<ExerciseOutcome> {
        let quality = Quality::new(record.quality)?;
        if !record.duration_seconds.is_finite() || record.duration_seconds < 0.0 {
            return Err(StrandError::validation_with_suggestion(
                format!("Invalid exercise duration: {}", record.duration_seconds),
                "Report the duration in seconds as a non-negative number",
            ));
        }

        let session = self.active_session(&record.session_id)?;
        let detail = StrandDetail::for_exercise(
            record.strand,
            quality,
            &record.response_text,
            record.duration_seconds,
        );
        let log_entry = PracticeLogEntry {
            learner_id: session.learner_id.clone(),
            session_id: session.session_id.clone(),
            item_id: record.item_id.clone(),
            node_id: record.node_id.clone(),
            strand: record.strand,
            practiced_at: now,
            duration_seconds: record.duration_seconds,
            quality: Some(quality),
            detail,
        };

        // Every read happens before the write; after it only in-memory work remains.
        let window = self.allocator.balance_config().lookback;
        let mut history = self
            .items
            .practice_log(&session.learner_id, window_start(window, now))?;
        let mut session_log = self.items.session_log(&session.session_id)?;
        let mut reviews = self.items.session_reviews(&session.session_id)?;

        let update = match &record.item_id {
            Some(item_id) => {
                let (update, event) =
                    self.review_item(item_id, &record, quality, log_entry.clone(), now)?;
                reviews.push(event);
                Some(update)
            }
            None => {
                self.items.log_practice(&log_entry)?;
                None
            }
        };

        history.push(log_entry.clone());
        session_log.push(log_entry);
        let balance = compute_balance(&history, window, now);
        let progress = session_progress(&session, &session_log, &reviews);
        let feedback = exercise_feedback(
            quality,
            update
                .as_ref()
                .map(|u| (u.stability, u.mastery_status, u.mastery_changed)),
            &balance,
            self.allocator.balance_config(),
        );

        Ok(ExerciseOutcome {
            session_id: session.session_id,
            quality: quality.value(),
            item: update,
            balance,
            progress,
            feedback,
        })
    }

    /// Close a session and summarize it.
    pub fn end_session(&self, session_id: &str, now: DateTime<Utc>) -> StrandResult<SessionSummary> {
        let mut session = self.active_session(session_id)?;

        let progress = session_progress(
            &session,
            &self.items.session_log(session_id)?,
            &self.items.session_reviews(session_id)?,
        );
        let balance = self.current_balance(&session.learner_id, now)?;
        let status = balance_status(&balance, self.allocator.balance_config());
        let actual_minutes = now.signed_duration_since(session.started_at).num_seconds() as f64 / 60.0;

        session.ended_at = Some(now);
        self.sessions.save(&session)?;

        tracing::info!(
            session_id,
            learner_id = %session.learner_id,
            completed = progress.completed,
            actual_minutes,
            "Session ended"
        );

        Ok(SessionSummary {
            session_id: session.session_id,
            learner_id: session.learner_id,
            exercises_completed: progress.completed,
            target_minutes: session.target_minutes,
            actual_minutes,
            average_quality: progress.average_quality(),
            mastery_changes: progress.mastery_changes,
            final_balance: balance,
            balance_status: status,
            notes: session.notes,
        })
    }

    /// Promote secure levels for skills whose next level is mostly mastered.
    ///
    /// Returns the promotions and the updated profile; saving it is up to
    /// the caller.
    pub fn promote_secure_levels(
        &self,
        profile: &LearnerProfile,
    ) -> StrandResult<(Vec<Promotion>, LearnerProfile)> {
        let items = self.items.all_items()?;
        let nodes = self.catalogue.nodes()?;
        let promoted = promotions(profile, &items, &nodes, self.config.coach.promotion_ratio);

        let mut updated = profile.clone();
        for promotion in &promoted {
            updated.set_secure_level(promotion.skill, promotion.to);
            tracing::info!(
                learner_id = %profile.learner_id,
                skill = %promotion.skill,
                from = %promotion.from,
                to = %promotion.to,
                "Promoted secure level"
            );
        }
        Ok((promoted, updated))
    }

    /// Item and review counters at `now`.
    pub fn learner_stats(&self, now: DateTime<Utc>) -> StrandResult<LearnerStats> {
        let items = self.items.all_items()?;
        let reviews = self.items.reviews_since(None)?;
        Ok(learner_stats(&items, &reviews, now))
    }

    fn plan(
        &self,
        profile: &LearnerProfile,
        minutes: f64,
        preference: Option<&StrandPreference>,
        now: DateTime<Utc>,
    ) -> StrandResult<SessionPlan> {
        if !minutes.is_finite() || minutes <= 0.0 {
            return Err(StrandError::validation_with_suggestion(
                format!("Invalid session length: {} minutes", minutes),
                "Ask for a positive number of minutes, e.g. 20",
            ));
        }

        let pools = self.candidates.pools(profile, now)?;
        let window = self.allocator.balance_config().lookback;
        let history = self
            .items
            .practice_log(&profile.learner_id, window_start(window, now))?;
        Ok(self
            .allocator
            .plan_session(&history, &pools, minutes, preference, now))
    }

    fn take_preview(
        &self,
        learner_id: &str,
        minutes: f64,
        preference: Option<&StrandPreference>,
        now: DateTime<Utc>,
    ) -> StrandResult<Option<SessionPlan>> {
        let mut previews = self
            .previews
            .lock()
            .map_err(|e| StrandError::Internal(e.to_string()))?;
        let ttl = Duration::minutes(self.config.coach.preview_ttl_minutes);

        let reusable = previews.get(learner_id).is_some_and(|cached| {
            now.signed_duration_since(cached.created_at) <= ttl
                && cached.minutes == minutes
                && cached.preference.as_ref() == preference
        });
        if !reusable {
            return Ok(None);
        }
        tracing::debug!(learner_id, "Reusing previewed plan");
        Ok(previews.remove(learner_id).map(|cached| cached.plan))
    }

    fn active_session(&self, session_id: &str) -> StrandResult<SessionRecord> {
        let session = self
            .sessions
            .load(session_id)?
            .ok_or_else(|| StrandError::session_not_found(session_id))?;
        if !session.is_active() {
            return Err(StrandError::validation_with_suggestion(
                format!("Session '{}' has already ended", session_id),
                "Start a new session",
            ));
        }
        Ok(session)
    }

    fn review_item(
        &self,
        item_id: &str,
        record: &ExerciseRecord,
        quality: Quality,
        log_entry: PracticeLogEntry,
        now: DateTime<Utc>,
    ) -> StrandResult<(ItemUpdate, ReviewEvent)> {
        let (current, create) = match self.items.get_item(item_id)? {
            Some(item) => (item, false),
            None if self.config.coach.auto_create_items => {
                tracing::debug!(item_id, node_id = %record.node_id, "Creating item on first score");
                (
                    Item::new(item_id, record.node_id.clone(), record.strand, record.skill),
                    true,
                )
            }
            None => return Err(StrandError::item_not_found(item_id)),
        };

        let outcome = self.model.review(&current, quality, now);
        let average = self.items.average_quality(item_id)?.including(quality);
        let mut updated = outcome.item;
        updated.mastery_status = self.classifier.classify(&updated, average.mean);

        let event = ReviewEvent {
            item_id: item_id.to_string(),
            session_id: Some(record.session_id.clone()),
            quality,
            reviewed_at: now,
            strand: record.strand,
            exercise_type: Some(record.exercise_type.unwrap_or_else(|| record.strand.exercise_type())),
            stability_before: current.stability,
            stability_after: updated.stability,
            difficulty_before: current.difficulty,
            difficulty_after: updated.difficulty,
            mastery_before: current.mastery_status,
            mastery_after: updated.mastery_status,
        };

        let update = ItemUpdate {
            item_id: item_id.to_string(),
            next_due_at: outcome.next_due_at,
            stability: updated.stability,
            difficulty: updated.difficulty,
            retrievability: outcome.retrievability,
            mastery_status: updated.mastery_status,
            mastery_changed: current.mastery_status != updated.mastery_status,
        };

        let commit = ReviewCommit {
            expected_reps: current.reps,
            create,
            event,
            log_entry,
            item: updated,
        };
        self.items.commit_review(&commit)?;
        Ok((update, commit.event))
    }
}
