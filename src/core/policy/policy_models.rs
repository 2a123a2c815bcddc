// Policy domain models - the resolved moderation settings for one guild.
//
// These are pure domain types with no storage dependencies.
// A `Policy` is only ever produced by merging the compiled-in defaults with
// the guild's stored overrides; it is replaced wholesale on re-resolution,
// never patched field by field.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};

/// Bump when the set of recognized `category.field` keys changes.
pub const POLICY_SCHEMA_VERSION: u32 = 1;

/// Resolved moderation settings for a guild.
///
/// Serializable so the resolver can park a snapshot in the cache store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    /// Master switch for the whole moderation pipeline
    pub enabled: bool,
    /// Rate / duplicate / mention / caps / invite heuristics
    pub spam_protection: bool,
    /// Fuzzy lexicon matching on message bodies
    pub profanity_filter: bool,
    /// Channels the pipeline never touches
    pub ignored_channels: HashSet<u64>,
    /// Roles whose members the pipeline never touches
    pub ignored_roles: HashSet<u64>,
    /// Where audit records go; falls back to the originating channel
    pub log_channel: Option<u64>,
    /// Settings that target no known `category.field` - kept verbatim for
    /// legacy-format compatibility, never consulted by the pipeline.
    pub legacy: BTreeMap<String, Value>,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            enabled: true,
            spam_protection: true,
            profanity_filter: true,
            ignored_channels: HashSet::new(),
            ignored_roles: HashSet::new(),
            log_channel: None,
            legacy: BTreeMap::new(),
        }
    }
}

/// Where a stored override ended up during the merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverrideOutcome {
    /// Matched a typed field and was applied
    Applied,
    /// Unknown key, preserved in the legacy bucket
    Legacy,
    /// Unparseable or wrong-typed value, dropped
    Dropped,
}

/// One durable override row as read from the override store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverrideRow {
    /// `"category.field"` key, e.g. `"moderation.enabled"`
    pub setting_key: String,
    /// Raw JSON value as stored
    pub value_json: String,
}

impl Policy {
    /// Merge a guild's override rows onto the compiled-in defaults.
    ///
    /// One bad row never aborts the merge: malformed values are dropped and
    /// unknown keys land in the legacy bucket.
    pub fn from_overrides(rows: &[OverrideRow]) -> Self {
        let mut policy = Policy::default();
        for row in rows {
            let outcome = policy.apply_override(&row.setting_key, &row.value_json);
            if outcome == OverrideOutcome::Dropped {
                tracing::debug!(key = %row.setting_key, "Dropping malformed policy override");
            }
        }
        policy
    }

    /// Apply a single `"category.field"` override to this policy.
    pub fn apply_override(&mut self, key: &str, value_json: &str) -> OverrideOutcome {
        let value: Value = match serde_json::from_str(value_json) {
            Ok(v) => v,
            Err(_) => return OverrideOutcome::Dropped,
        };

        let field = match key.strip_prefix("moderation.") {
            Some(f) => f,
            None => {
                self.legacy.insert(key.to_string(), value);
                return OverrideOutcome::Legacy;
            }
        };

        match field {
            "enabled" => Self::apply_bool(&value, |b| self.enabled = b),
            "spam_protection" => Self::apply_bool(&value, |b| self.spam_protection = b),
            "profanity_filter" => Self::apply_bool(&value, |b| self.profanity_filter = b),
            "ignored_channels" => Self::apply_id_set(&value, |s| self.ignored_channels = s),
            "ignored_roles" => Self::apply_id_set(&value, |s| self.ignored_roles = s),
            "log_channel" => match &value {
                Value::Null => {
                    self.log_channel = None;
                    OverrideOutcome::Applied
                }
                other => match parse_id(other) {
                    Some(id) => {
                        self.log_channel = Some(id);
                        OverrideOutcome::Applied
                    }
                    None => OverrideOutcome::Dropped,
                },
            },
            _ => {
                // Known category, unknown field - same legacy routing as an
                // unknown category so older stored keys keep round-tripping.
                self.legacy.insert(key.to_string(), value);
                OverrideOutcome::Legacy
            }
        }
    }

    /// Current value of a settings key, for change-history bookkeeping.
    pub fn setting_value(&self, key: &str) -> Value {
        match key.strip_prefix("moderation.") {
            Some("enabled") => Value::Bool(self.enabled),
            Some("spam_protection") => Value::Bool(self.spam_protection),
            Some("profanity_filter") => Value::Bool(self.profanity_filter),
            Some("ignored_channels") => id_set_value(&self.ignored_channels),
            Some("ignored_roles") => id_set_value(&self.ignored_roles),
            Some("log_channel") => self
                .log_channel
                .map(|id| Value::String(id.to_string()))
                .unwrap_or(Value::Null),
            _ => self.legacy.get(key).cloned().unwrap_or(Value::Null),
        }
    }

    fn apply_bool(value: &Value, set: impl FnOnce(bool)) -> OverrideOutcome {
        match value.as_bool() {
            Some(b) => {
                set(b);
                OverrideOutcome::Applied
            }
            None => OverrideOutcome::Dropped,
        }
    }

    fn apply_id_set(value: &Value, set: impl FnOnce(HashSet<u64>)) -> OverrideOutcome {
        match value.as_array() {
            Some(items) => {
                let ids: HashSet<u64> = items.iter().filter_map(parse_id).collect();
                set(ids);
                OverrideOutcome::Applied
            }
            None => OverrideOutcome::Dropped,
        }
    }
}

/// Snowflake-style IDs arrive either as JSON numbers or as decimal strings.
fn parse_id(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn id_set_value(ids: &HashSet<u64>) -> Value {
    let mut sorted: Vec<u64> = ids.iter().copied().collect();
    sorted.sort_unstable();
    Value::Array(
        sorted
            .into_iter()
            .map(|id| Value::String(id.to_string()))
            .collect(),
    )
}

/// One append-only settings audit entry, retained for 7 days.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeHistoryEntry {
    pub date: DateTime<Utc>,
    /// Always "system" for pipeline-driven writes
    pub actor: String,
    pub key: String,
    pub old_value: Value,
    pub new_value: Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_have_everything_enabled() {
        let policy = Policy::default();
        assert!(policy.enabled);
        assert!(policy.spam_protection);
        assert!(policy.profanity_filter);
        assert!(policy.ignored_channels.is_empty());
        assert_eq!(policy.log_channel, None);
    }

    #[test]
    fn merge_applies_typed_fields() {
        let rows = vec![
            OverrideRow {
                setting_key: "moderation.enabled".into(),
                value_json: "false".into(),
            },
            OverrideRow {
                setting_key: "moderation.ignored_channels".into(),
                value_json: r#"["123", 456]"#.into(),
            },
            OverrideRow {
                setting_key: "moderation.log_channel".into(),
                value_json: r#""789""#.into(),
            },
        ];

        let policy = Policy::from_overrides(&rows);
        assert!(!policy.enabled);
        assert!(policy.spam_protection); // untouched default
        assert_eq!(
            policy.ignored_channels,
            HashSet::from([123u64, 456u64])
        );
        assert_eq!(policy.log_channel, Some(789));
    }

    #[test]
    fn unknown_keys_route_to_legacy_bucket() {
        let mut policy = Policy::default();

        let outcome = policy.apply_override("leveling.xp_rate", "2");
        assert_eq!(outcome, OverrideOutcome::Legacy);

        let outcome = policy.apply_override("moderation.max_emojis", "5");
        assert_eq!(outcome, OverrideOutcome::Legacy);

        assert_eq!(policy.legacy.get("leveling.xp_rate"), Some(&json!(2)));
        assert_eq!(policy.legacy.get("moderation.max_emojis"), Some(&json!(5)));
    }

    #[test]
    fn malformed_values_are_dropped_without_aborting_merge() {
        let rows = vec![
            OverrideRow {
                setting_key: "moderation.enabled".into(),
                value_json: "{not json".into(),
            },
            OverrideRow {
                setting_key: "moderation.spam_protection".into(),
                value_json: r#""yes""#.into(), // wrong type for a bool field
            },
            OverrideRow {
                setting_key: "moderation.profanity_filter".into(),
                value_json: "false".into(),
            },
        ];

        let policy = Policy::from_overrides(&rows);
        assert!(policy.enabled); // bad row left the default alone
        assert!(policy.spam_protection);
        assert!(!policy.profanity_filter); // good row after bad ones still applied
    }

    #[test]
    fn setting_value_reflects_current_state() {
        let mut policy = Policy::default();
        assert_eq!(policy.setting_value("moderation.enabled"), json!(true));

        policy.apply_override("moderation.enabled", "false");
        assert_eq!(policy.setting_value("moderation.enabled"), json!(false));
        assert_eq!(policy.setting_value("moderation.log_channel"), Value::Null);
        assert_eq!(policy.setting_value("something.else"), Value::Null);
    }
}
