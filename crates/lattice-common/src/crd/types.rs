//! Shared status types for Lattice CRDs

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Condition status following Kubernetes conventions
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum ConditionStatus {
    /// Condition is true
    True,
    /// Condition is false
    False,
    /// Condition status is unknown
    #[default]
    Unknown,
}

impl std::fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::True => write!(f, "True"),
            Self::False => write!(f, "False"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Kubernetes-style condition for status reporting
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct Condition {
    /// Type of condition (e.g., Ready, NetworkConfigured)
    #[serde(rename = "type")]
    pub type_: String,

    /// Status of the condition (True, False, Unknown)
    pub status: ConditionStatus,

    /// Machine-readable reason for the condition
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,

    /// Human-readable message
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,

    /// Last time the condition transitioned
    #[serde(rename = "lastTransitionTime")]
    pub last_transition_time: DateTime<Utc>,
}

impl Condition {
    /// Create a new condition with the current timestamp
    pub fn new(
        type_: impl Into<String>,
        status: ConditionStatus,
        reason: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            type_: type_.into(),
            status,
            reason: reason.into(),
            message: message.into(),
            last_transition_time: Utc::now(),
        }
    }

    /// True when status, reason and message match, ignoring the timestamp
    pub fn same_state(&self, other: &Condition) -> bool {
        self.type_ == other.type_
            && self.status == other.status
            && self.reason == other.reason
            && self.message == other.message
    }
}

/// Insert or replace a condition by type.
///
/// An existing condition in the same state is left untouched, keeping its
/// `lastTransitionTime`, so re-marking a steady condition produces a status
/// that compares equal to the previous one. Returns true if anything changed.
pub fn set_condition(conditions: &mut Vec<Condition>, condition: Condition) -> bool {
    match conditions.iter_mut().find(|c| c.type_ == condition.type_) {
        Some(existing) if existing.same_state(&condition) => false,
        Some(existing) => {
            *existing = condition;
            true
        }
        None => {
            conditions.push(condition);
            conditions.sort_by(|a, b| a.type_.cmp(&b.type_));
            true
        }
    }
}

/// Find a condition by type
pub fn find_condition<'a>(conditions: &'a [Condition], type_: &str) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.type_ == type_)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn condition_new_stamps_time() {
        let before = Utc::now();
        let condition = Condition::new("Ready", ConditionStatus::True, "Ready", "ok");
        let after = Utc::now();

        assert_eq!(condition.type_, "Ready");
        assert_eq!(condition.status, ConditionStatus::True);
        assert!(condition.last_transition_time >= before);
        assert!(condition.last_transition_time <= after);
    }

    #[test]
    fn set_condition_keeps_timestamp_when_unchanged() {
        let mut conditions = vec![];
        assert!(set_condition(
            &mut conditions,
            Condition::new("Ready", ConditionStatus::True, "", "")
        ));
        let snapshot = conditions.clone();

        assert!(!set_condition(
            &mut conditions,
            Condition::new("Ready", ConditionStatus::True, "", "")
        ));
        assert_eq!(conditions, snapshot);
    }

    #[test]
    fn set_condition_replaces_on_change() {
        let mut conditions = vec![Condition::new("Ready", ConditionStatus::Unknown, "", "")];
        assert!(set_condition(
            &mut conditions,
            Condition::new("Ready", ConditionStatus::False, "Broken", "boom")
        ));
        assert_eq!(conditions.len(), 1);
        assert_eq!(conditions[0].status, ConditionStatus::False);
        assert_eq!(conditions[0].reason, "Broken");
    }

    #[test]
    fn set_condition_keeps_types_sorted() {
        let mut conditions = vec![];
        set_condition(&mut conditions, Condition::new("Ready", ConditionStatus::Unknown, "", ""));
        set_condition(
            &mut conditions,
            Condition::new("LoadBalancerReady", ConditionStatus::Unknown, "", ""),
        );
        let types: Vec<_> = conditions.iter().map(|c| c.type_.as_str()).collect();
        assert_eq!(types, vec!["LoadBalancerReady", "Ready"]);
        assert!(find_condition(&conditions, "Ready").is_some());
        assert!(find_condition(&conditions, "Missing").is_none());
    }

    #[test]
    fn condition_status_display() {
        assert_eq!(ConditionStatus::True.to_string(), "True");
        assert_eq!(ConditionStatus::False.to_string(), "False");
        assert_eq!(ConditionStatus::Unknown.to_string(), "Unknown");
    }
}
