//! Wall-clock and relative-time helpers.

use chrono::{DateTime, Duration, Utc};

/// The current wall-clock time as a timezone-aware UTC timestamp.
pub fn utcnow() -> DateTime<Utc> {
    Utc::now()
}

/// Render the time from `start` to `end` as a phrase relative to the present.
///
/// A non-negative delta reads as the past ("5 minutes ago", "last week"), a
/// negative delta as the future ("in 5 minutes", "next week").
pub fn time_as_relative_string(start: DateTime<Utc>, end: DateTime<Utc>) -> String {
    let delta = end - start;
    if delta >= Duration::zero() {
        past_phrase(delta)
    } else {
        future_phrase(-delta)
    }
}

fn past_phrase(delta: Duration) -> String {
    if delta < Duration::seconds(60) {
        "just now".to_string()
    } else if delta < Duration::minutes(2) {
        "a minute ago".to_string()
    } else if delta < Duration::minutes(60) {
        format!("{} minutes ago", delta.num_minutes())
    } else if delta < Duration::hours(2) {
        "an hour ago".to_string()
    } else if delta < Duration::hours(24) {
        "earlier today".to_string()
    } else if delta < Duration::days(2) {
        "yesterday".to_string()
    } else if delta < Duration::days(7) {
        format!("{} days ago", delta.num_days())
    } else if delta < Duration::days(30) {
        "last week".to_string()
    } else if delta < Duration::days(365) {
        "this year".to_string()
    } else if delta < Duration::days(365 * 2) {
        "a year ago".to_string()
    } else {
        format!("{} years ago", delta.num_days() / 365)
    }
}

fn future_phrase(ahead: Duration) -> String {
    if ahead < Duration::seconds(60) {
        "in a few seconds".to_string()
    } else if ahead < Duration::minutes(2) {
        "in a minute".to_string()
    } else if ahead < Duration::minutes(60) {
        format!("in {} minutes", ahead.num_minutes())
    } else if ahead < Duration::hours(2) {
        "in an hour".to_string()
    } else if ahead < Duration::hours(24) {
        format!("in {} hours", ahead.num_hours())
    } else if ahead < Duration::days(2) {
        "tomorrow".to_string()
    } else if ahead < Duration::days(7) {
        format!("in {} days", ahead.num_days())
    } else if ahead < Duration::days(30) {
        "next week".to_string()
    } else if ahead < Duration::days(365) {
        "later this year".to_string()
    } else if ahead < Duration::days(365 * 2) {
        "next year".to_string()
    } else {
        format!("in {} years", ahead.num_days() / 365)
    }
}
