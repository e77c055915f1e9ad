use chrono::{DateTime, Duration, Local, LocalResult, NaiveDate, NaiveDateTime, TimeZone, Utc};
use rand::{Rng, distributions::Alphanumeric, thread_rng};
use serde::{Deserialize, Serialize};

const ID_LEN: usize = 8;

pub const MS_PER_HOUR: i64 = 3_600_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    pub id: String,
    pub title: String,
    pub description: String,
    pub total_hours: f64,
    pub total_time_spent_ms: i64,
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Goal {
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        total_hours: f64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: generate_id(),
            title: title.into(),
            description: description.into(),
            total_hours,
            total_time_spent_ms: 0,
            is_active: false,
            start_time: None,
            created_at: now,
        }
    }

    pub fn hours_spent(&self) -> f64 {
        self.total_time_spent_ms as f64 / MS_PER_HOUR as f64
    }

    pub fn remaining_hours(&self) -> f64 {
        self.total_hours - self.hours_spent()
    }

    pub fn progress_fraction(&self) -> f64 {
        if self.total_hours <= 0.0 {
            return 0.0;
        }
        (self.hours_spent() / self.total_hours).min(1.0)
    }

    /// Milliseconds accrued by the running timer but not yet materialized
    /// into a session. Zero when the goal is idle.
    pub fn elapsed_ms(&self, now: DateTime<Utc>) -> i64 {
        match (self.is_active, self.start_time) {
            (true, Some(start)) => (now - start).num_milliseconds(),
            _ => 0,
        }
    }

    /// Recorded total plus the running timer's unmaterialized elapsed time,
    /// the figure a live progress display should use.
    pub fn live_spent_ms(&self, now: DateTime<Utc>) -> i64 {
        self.total_time_spent_ms + self.elapsed_ms(now)
    }
}

/// A contiguous or backdated block of time attributed to one goal. Sessions
/// are append-only: once recorded they are never mutated or deleted, and they
/// outlive the deletion of their goal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSession {
    pub goal_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_ms: i64,
}

impl TimeSession {
    pub fn new(
        goal_id: impl Into<String>,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Self {
        Self {
            goal_id: goal_id.into(),
            start_time,
            end_time,
            duration_ms: (end_time - start_time).num_milliseconds(),
        }
    }

    pub fn duration_hours(&self) -> f64 {
        self.duration_ms as f64 / MS_PER_HOUR as f64
    }

    /// Local calendar day this session is accounted under. Bucketing follows
    /// the session's start, so a backdated entry anchored to midnight lands
    /// on the evening of the previous day.
    pub fn local_day(&self) -> NaiveDate {
        local_day_for_timestamp(self.start_time)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveSessionMarker {
    pub goal_id: String,
    pub start_time: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

pub fn local_day_for_timestamp(timestamp: DateTime<Utc>) -> NaiveDate {
    timestamp.with_timezone(&Local).date_naive()
}

/// Midnight at the start of `day` in the local timezone, expressed in UTC.
/// Resolves DST gaps by walking forward to the first representable minute.
pub fn local_day_start(day: NaiveDate) -> DateTime<Utc> {
    let midnight = day.and_hms_opt(0, 0, 0).expect("midnight must be valid");
    local_naive_to_utc_resolved(midnight)
}

fn local_naive_to_utc(naive: NaiveDateTime) -> Option<DateTime<Utc>> {
    match Local.from_local_datetime(&naive) {
        LocalResult::Single(local_datetime) => Some(local_datetime.with_timezone(&Utc)),
        LocalResult::Ambiguous(first, second) => Some(first.min(second).with_timezone(&Utc)),
        LocalResult::None => None,
    }
}

fn local_naive_to_utc_resolved(naive: NaiveDateTime) -> DateTime<Utc> {
    if let Some(timestamp) = local_naive_to_utc(naive) {
        return timestamp;
    }

    let mut cursor = naive + Duration::minutes(1);
    for _ in 0..120 {
        if let Some(timestamp) = local_naive_to_utc(cursor) {
            return timestamp;
        }
        cursor += Duration::minutes(1);
    }

    panic!("local day boundary does not exist");
}

pub fn generate_id() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(ID_LEN)
        .map(char::from)
        .collect()
}

pub fn format_duration(milliseconds: i64) -> String {
    let total_seconds = milliseconds.max(0) / 1000;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{hours}h {minutes}m {seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}

pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp
        .with_timezone(&Local)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::{Goal, MS_PER_HOUR, TimeSession, format_duration, generate_id};

    #[test]
    fn formats_durations_per_magnitude() {
        assert_eq!(format_duration(0), "0s");
        assert_eq!(format_duration(5_000), "5s");
        assert_eq!(format_duration(65_000), "1m 5s");
        assert_eq!(format_duration(3_665_000), "1h 1m 5s");
    }

    #[test]
    fn clamps_negative_durations_for_display() {
        assert_eq!(format_duration(-1_500), "0s");
    }

    #[test]
    fn session_duration_matches_bounds() {
        let start = Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2026, 1, 1, 10, 30, 0).unwrap();
        let session = TimeSession::new("g1", start, end);
        assert_eq!(session.duration_ms, 90 * 60 * 1000);
        assert_eq!(
            (session.end_time - session.start_time).num_milliseconds(),
            session.duration_ms
        );
        assert_eq!(session.duration_hours(), 1.5);
    }

    #[test]
    fn goal_progress_helpers() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 8, 0, 0).unwrap();
        let mut goal = Goal::new("Read", "", 10.0, now);
        assert_eq!(goal.hours_spent(), 0.0);
        assert_eq!(goal.remaining_hours(), 10.0);
        assert_eq!(goal.progress_fraction(), 0.0);

        goal.total_time_spent_ms = 5 * MS_PER_HOUR;
        assert_eq!(goal.hours_spent(), 5.0);
        assert_eq!(goal.progress_fraction(), 0.5);

        goal.total_time_spent_ms = 12 * MS_PER_HOUR;
        assert_eq!(goal.progress_fraction(), 1.0);
    }

    #[test]
    fn elapsed_is_zero_for_idle_goal() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 8, 0, 0).unwrap();
        let goal = Goal::new("Read", "", 10.0, now);
        assert_eq!(goal.elapsed_ms(now + Duration::hours(1)), 0);
        assert_eq!(goal.live_spent_ms(now + Duration::hours(1)), 0);
    }

    #[test]
    fn live_spent_includes_running_elapsed() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 8, 0, 0).unwrap();
        let mut goal = Goal::new("Read", "", 10.0, now);
        goal.total_time_spent_ms = MS_PER_HOUR;
        goal.is_active = true;
        goal.start_time = Some(now);

        let later = now + Duration::minutes(30);
        assert_eq!(goal.elapsed_ms(later), 30 * 60 * 1000);
        assert_eq!(goal.live_spent_ms(later), MS_PER_HOUR + 30 * 60 * 1000);
    }

    #[test]
    fn ids_are_distinct() {
        assert_ne!(generate_id(), generate_id());
    }
}
