use std::cmp::Reverse;
use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::domain::{Goal, TimeSession};

pub const DAILY_HOUR_LIMIT: f64 = 24.0;

const PACE_WINDOW: usize = 7;
const MIN_PACE_SESSIONS: usize = 2;

#[derive(Debug, Clone, PartialEq)]
pub struct DailyLimitCheck {
    pub is_valid: bool,
    pub current_hours: f64,
    pub message: Option<String>,
}

/// Checks a candidate entry against the 24-hour-per-calendar-day ceiling.
/// The cap is global: hours already logged on `target_date` count across
/// every goal, not just the one receiving the new entry. A day filled to
/// exactly 24.0 hours is still valid; only exceeding the ceiling rejects.
pub fn check_daily_limit(
    sessions: &[TimeSession],
    candidate_hours: f64,
    target_date: NaiveDate,
) -> DailyLimitCheck {
    let mut current_hours = 0.0;
    let mut goal_ids: HashSet<&str> = HashSet::new();
    for session in sessions_on_day(sessions, target_date) {
        current_hours += session.duration_hours();
        goal_ids.insert(session.goal_id.as_str());
    }

    if current_hours + candidate_hours > DAILY_HOUR_LIMIT {
        let message = if goal_ids.is_empty() {
            format!(
                "cannot log {candidate_hours} hour(s) on {target_date}: the \
                 daily limit is 24 hours"
            )
        } else {
            let scope = if goal_ids.len() == 1 {
                "for this project".to_string()
            } else {
                format!("across {} projects", goal_ids.len())
            };
            format!(
                "cannot log {candidate_hours} more hour(s) on {target_date}: \
                 {current_hours:.1} hours already recorded {scope}, and the \
                 daily limit is 24 hours"
            )
        };
        return DailyLimitCheck {
            is_valid: false,
            current_hours,
            message: Some(message),
        };
    }

    DailyLimitCheck {
        is_valid: true,
        current_hours,
        message: None,
    }
}

/// Projects when a goal will hit its hour budget, assuming the recent pace
/// holds. The pace is the median of per-day hour totals over the goal's 7
/// most recent sessions; days without sessions are absent from the grouping,
/// not counted as zero. Returns `None` when there is too little history
/// (fewer than 2 sessions) or nothing left to do.
pub fn estimate_completion(
    goal: &Goal,
    sessions: &[TimeSession],
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    let mut goal_sessions: Vec<&TimeSession> = sessions
        .iter()
        .filter(|session| session.goal_id == goal.id)
        .collect();
    if goal_sessions.len() < MIN_PACE_SESSIONS {
        return None;
    }

    goal_sessions.sort_by_key(|session| Reverse(session.start_time));

    let mut daily_hours: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for session in goal_sessions.into_iter().take(PACE_WINDOW) {
        *daily_hours.entry(session.local_day()).or_insert(0.0) += session.duration_hours();
    }

    let mut per_day: Vec<f64> = daily_hours.into_values().collect();
    if per_day.is_empty() {
        return None;
    }
    per_day.sort_by(f64::total_cmp);

    let median_hours_per_day = median_of_sorted(&per_day);
    if median_hours_per_day <= 0.0 {
        return None;
    }

    let remaining_hours = goal.remaining_hours();
    if remaining_hours <= 0.0 {
        return None;
    }

    let days_to_complete = (remaining_hours / median_hours_per_day).ceil() as i64;
    Some(now + Duration::days(days_to_complete))
}

/// Per-goal totals for one calendar day, sorted by duration descending then
/// goal id, the shape the summary view renders.
pub fn daily_goal_totals(sessions: &[TimeSession], day: NaiveDate) -> Vec<(String, i64)> {
    let mut totals: BTreeMap<&str, i64> = BTreeMap::new();
    for session in sessions_on_day(sessions, day) {
        *totals.entry(session.goal_id.as_str()).or_insert(0) += session.duration_ms;
    }

    let mut rows = totals
        .into_iter()
        .map(|(goal_id, duration_ms)| (goal_id.to_string(), duration_ms))
        .collect::<Vec<_>>();
    rows.sort_by(|left, right| right.1.cmp(&left.1).then_with(|| left.0.cmp(&right.0)));
    rows
}

fn sessions_on_day(sessions: &[TimeSession], day: NaiveDate) -> impl Iterator<Item = &TimeSession> {
    sessions
        .iter()
        .filter(move |session| session.local_day() == day)
}

fn median_of_sorted(values: &[f64]) -> f64 {
    let len = values.len();
    if len % 2 == 0 {
        (values[len / 2 - 1] + values[len / 2]) / 2.0
    } else {
        values[len / 2]
    }
}
