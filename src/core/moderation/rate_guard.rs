// Sliding-window spam heuristics.
//
// Stateful per (guild, user): every call prunes the actor's timestamp window
// and appends the current instant, then runs the checks in a fixed priority
// order with first-match-wins. State mutations stick whether or not a check
// fires - a miss is never rolled back.

use super::moderation_models::{ActorState, MessageEvent, RuleCategory, Violation};
use chrono::{DateTime, Duration, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

/// Trailing window for the flood check.
pub const FLOOD_WINDOW_MS: i64 = 7_000;
/// Messages inside the window that constitute a flood.
pub const FLOOD_THRESHOLD: usize = 6;
/// How many recent message bodies are kept for duplicate detection.
pub const TEXT_HISTORY_LEN: usize = 5;
/// Occurrences of one body within the history that constitute spam.
pub const DUPLICATE_THRESHOLD: usize = 3;
/// Combined user+role mentions allowed per message.
pub const MENTION_LIMIT: u32 = 6;
/// Caps check ignores messages with fewer letters than this.
pub const CAPS_MIN_LETTERS: usize = 10;
/// Uppercase ratio at or above which the caps check fires.
pub const CAPS_RATIO: f64 = 0.70;

static INVITE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:discord\.gg|discord(?:app)?\.com/invite)/[a-z0-9-]+")
        .expect("invite pattern compiles")
});

/// One spam check: inspects the message and the actor's window state.
type Check = fn(&MessageEvent, &mut ActorState) -> Option<Violation>;

/// Priority order is fixed; the first violation wins.
const CHECKS: &[Check] = &[
    invite_link,
    mass_mentions,
    excessive_caps,
    rate_flood,
    duplicate_messages,
];

pub struct RateGuard;

impl RateGuard {
    /// Run the ordered spam checks for one message.
    ///
    /// The caller persists `state` back into the actor store afterwards
    /// regardless of the outcome.
    pub fn evaluate(
        state: &mut ActorState,
        now: DateTime<Utc>,
        event: &MessageEvent,
    ) -> Option<Violation> {
        let cutoff = now - Duration::milliseconds(FLOOD_WINDOW_MS);
        while matches!(state.recent_timestamps.front(), Some(&t) if t <= cutoff) {
            state.recent_timestamps.pop_front();
        }
        state.recent_timestamps.push_back(now);
        state.last_seen = now;

        CHECKS.iter().find_map(|check| check(event, state))
    }
}

fn spam(reason: &str) -> Option<Violation> {
    Some(Violation {
        category: RuleCategory::SpamProtection,
        reason: reason.to_string(),
    })
}

fn invite_link(event: &MessageEvent, _state: &mut ActorState) -> Option<Violation> {
    if INVITE_RE.is_match(&event.body) {
        spam("Posting invite links")
    } else {
        None
    }
}

fn mass_mentions(event: &MessageEvent, _state: &mut ActorState) -> Option<Violation> {
    if event.user_mentions + event.role_mentions >= MENTION_LIMIT {
        spam("Too many mentions in one message")
    } else {
        None
    }
}

fn excessive_caps(event: &MessageEvent, _state: &mut ActorState) -> Option<Violation> {
    let mut letters = 0usize;
    let mut uppercase = 0usize;
    for ch in event.body.chars().filter(|c| c.is_alphabetic()) {
        letters += 1;
        if ch.is_uppercase() {
            uppercase += 1;
        }
    }

    // Short shouts are fine; the ratio is defined as 0 below the floor.
    if letters < CAPS_MIN_LETTERS {
        return None;
    }
    if uppercase as f64 / letters as f64 >= CAPS_RATIO {
        spam("Excessive capital letters")
    } else {
        None
    }
}

fn rate_flood(_event: &MessageEvent, state: &mut ActorState) -> Option<Violation> {
    if state.recent_timestamps.len() >= FLOOD_THRESHOLD {
        spam("Sending messages too quickly")
    } else {
        None
    }
}

fn duplicate_messages(event: &MessageEvent, state: &mut ActorState) -> Option<Violation> {
    state.recent_texts.push_back(event.body.clone());
    while state.recent_texts.len() > TEXT_HISTORY_LEN {
        state.recent_texts.pop_front();
    }

    let occurrences = state
        .recent_texts
        .iter()
        .filter(|t| **t == event.body)
        .count();
    if occurrences >= DUPLICATE_THRESHOLD {
        spam("Sending duplicate messages")
    } else {
        None
    }
}
