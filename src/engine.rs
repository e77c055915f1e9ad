use std::fmt::{Display, Formatter};

use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::analysis::check_daily_limit;
use crate::domain::{
    ActiveSessionMarker, Goal, MS_PER_HOUR, TimeSession, local_day_for_timestamp, local_day_start,
};
use crate::storage::{Store, StorageError};

#[derive(Debug)]
pub enum EngineError {
    InvalidInput(String),
    NotFound(String),
    Storage(StorageError),
}

impl Display for EngineError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::InvalidInput(message) => write!(f, "{message}"),
            EngineError::NotFound(goal_id) => write!(f, "goal not found: {goal_id}"),
            EngineError::Storage(err) => write!(f, "storage failure: {err}"),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::Storage(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StorageError> for EngineError {
    fn from(err: StorageError) -> Self {
        EngineError::Storage(err)
    }
}

/// The time-accounting engine. This is the only place sessions are created
/// or a goal's timer fields change. It owns no durable state of its own:
/// the injected store is the source of truth, the in-memory collections are
/// working copies that every mutation persists before committing, so a
/// failed write leaves the previous in-memory state intact. Which goal is
/// active is a derived query over the collection, never a separate cache.
///
/// Operations take `now` explicitly so callers control the clock.
pub struct GoalTracker<S: Store> {
    store: S,
    goals: Vec<Goal>,
    sessions: Vec<TimeSession>,
}

impl<S: Store> GoalTracker<S> {
    /// Loads both collections from the store; read failures degrade to
    /// empty collections rather than failing the open.
    pub fn open(store: S) -> Self {
        let goals = store.load_goals().unwrap_or_default();
        let sessions = store.load_sessions().unwrap_or_default();
        let marker = store.load_active_marker().unwrap_or_default();

        let mut tracker = Self {
            store,
            goals,
            sessions,
        };
        tracker.reconcile_timer_state(marker);
        tracker
    }

    /// Repairs timer state after a reload: an active goal without a start
    /// recovers it from the marker or is deactivated, and if more than one
    /// goal claims the timer only the first keeps it.
    fn reconcile_timer_state(&mut self, marker: Option<ActiveSessionMarker>) {
        let mut timer_seen = false;
        for goal in &mut self.goals {
            if !goal.is_active {
                goal.start_time = None;
                continue;
            }
            if timer_seen {
                goal.is_active = false;
                goal.start_time = None;
                continue;
            }
            if goal.start_time.is_none() {
                goal.start_time = marker
                    .as_ref()
                    .filter(|marker| marker.goal_id == goal.id)
                    .map(|marker| marker.start_time);
            }
            if goal.start_time.is_none() {
                goal.is_active = false;
                continue;
            }
            timer_seen = true;
        }
    }

    pub fn goals(&self) -> &[Goal] {
        &self.goals
    }

    pub fn sessions(&self) -> &[TimeSession] {
        &self.sessions
    }

    pub fn goal(&self, goal_id: &str) -> Option<&Goal> {
        self.goals.iter().find(|goal| goal.id == goal_id)
    }

    pub fn active_goal(&self) -> Option<&Goal> {
        self.goals.iter().find(|goal| goal.is_active)
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn create_goal(
        &mut self,
        title: &str,
        description: &str,
        total_hours: f64,
        now: DateTime<Utc>,
    ) -> Result<Goal, EngineError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(EngineError::InvalidInput(
                "goal title must not be empty".to_string(),
            ));
        }
        if !total_hours.is_finite() || total_hours <= 0.0 {
            return Err(EngineError::InvalidInput(format!(
                "target hours must be a positive number, got {total_hours}"
            )));
        }

        let goal = Goal::new(title, description, total_hours, now);
        let mut goals = self.goals.clone();
        goals.push(goal.clone());
        self.store.save_goals(&goals)?;
        self.goals = goals;
        Ok(goal)
    }

    /// Removing the active goal discards its in-flight timer without
    /// recording a session. Unknown ids are a no-op, not an error; the
    /// returned flag tells whether a goal was actually removed.
    pub fn delete_goal(&mut self, goal_id: &str) -> Result<bool, EngineError> {
        let Some(index) = self.goals.iter().position(|goal| goal.id == goal_id) else {
            return Ok(false);
        };
        let was_active = self.goals[index].is_active;

        let mut goals = self.goals.clone();
        goals.remove(index);
        self.store.save_goals(&goals)?;
        if was_active {
            self.store.save_active_marker(None)?;
        }
        self.goals = goals;
        Ok(true)
    }

    /// Starts the timer on `goal_id`, first stopping whichever goal holds it
    /// so at most one goal is ever active. Restarting the already-active
    /// goal resets its running start to `now`.
    pub fn start_timer(&mut self, goal_id: &str, now: DateTime<Utc>) -> Result<(), EngineError> {
        let index = self
            .goals
            .iter()
            .position(|goal| goal.id == goal_id)
            .ok_or_else(|| EngineError::NotFound(goal_id.to_string()))?;

        if self
            .goals
            .iter()
            .any(|goal| goal.is_active && goal.id != goal_id)
        {
            self.stop_timer(now)?;
        }

        let mut goals = self.goals.clone();
        goals[index].is_active = true;
        goals[index].start_time = Some(now);

        let marker = ActiveSessionMarker {
            goal_id: goal_id.to_string(),
            start_time: now,
            last_updated: now,
        };
        self.store.save_goals(&goals)?;
        self.store.save_active_marker(Some(&marker))?;
        self.goals = goals;
        Ok(())
    }

    /// Materializes the running timer into a session and rolls its duration
    /// into the goal's total. With no timer running this is a pure no-op:
    /// nothing is appended and nothing is written. A clock that stepped
    /// backwards yields a negative duration, recorded as-is.
    pub fn stop_timer(&mut self, now: DateTime<Utc>) -> Result<Option<TimeSession>, EngineError> {
        let Some(index) = self.goals.iter().position(|goal| goal.is_active) else {
            return Ok(None);
        };
        let Some(started) = self.goals[index].start_time else {
            // active flag without a start carries no accountable time
            let mut goals = self.goals.clone();
            goals[index].is_active = false;
            self.store.save_goals(&goals)?;
            self.store.save_active_marker(None)?;
            self.goals = goals;
            return Ok(None);
        };

        let session = TimeSession::new(self.goals[index].id.clone(), started, now);
        let mut goals = self.goals.clone();
        goals[index].total_time_spent_ms += session.duration_ms;
        goals[index].is_active = false;
        goals[index].start_time = None;

        self.store.append_session(&session)?;
        self.store.save_goals(&goals)?;
        self.store.save_active_marker(None)?;
        self.goals = goals;
        self.sessions.push(session.clone());
        Ok(Some(session))
    }

    /// Logs `hours` against a goal without running the timer. When `date` is
    /// given the session anchors its end to local midnight of that day and
    /// stretches backwards; otherwise it ends at `now`. The daily cap is
    /// enforced here, before anything is written: a violation aborts the
    /// whole entry with the validator's message.
    pub fn add_manual_time(
        &mut self,
        goal_id: &str,
        hours: f64,
        date: Option<NaiveDate>,
        now: DateTime<Utc>,
    ) -> Result<TimeSession, EngineError> {
        if !hours.is_finite() || hours <= 0.0 {
            return Err(EngineError::InvalidInput(format!(
                "hours must be a positive number, got {hours}"
            )));
        }
        let index = self
            .goals
            .iter()
            .position(|goal| goal.id == goal_id)
            .ok_or_else(|| EngineError::NotFound(goal_id.to_string()))?;

        let target_day = date.unwrap_or_else(|| local_day_for_timestamp(now));
        let check = check_daily_limit(&self.sessions, hours, target_day);
        if !check.is_valid {
            let message = check
                .message
                .unwrap_or_else(|| "daily limit exceeded".to_string());
            return Err(EngineError::InvalidInput(message));
        }

        let end = match date {
            Some(day) => local_day_start(day),
            None => now,
        };
        let duration_ms = (hours * MS_PER_HOUR as f64).round() as i64;
        let start = end - Duration::milliseconds(duration_ms);
        let session = TimeSession::new(goal_id, start, end);

        let mut goals = self.goals.clone();
        goals[index].total_time_spent_ms += session.duration_ms;

        self.store.append_session(&session)?;
        self.store.save_goals(&goals)?;
        self.goals = goals;
        self.sessions.push(session.clone());
        Ok(session)
    }

    /// Writes both collections out as they stand. Used to materialize the
    /// data files on `init`.
    pub fn persist(&mut self) -> Result<(), EngineError> {
        self.store.save_goals(&self.goals)?;
        self.store.save_sessions(&self.sessions)?;
        Ok(())
    }
}
