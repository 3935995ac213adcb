//! Linear entity type definitions.

use serde::{Deserialize, Serialize};

/// Linear team
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    /// Unique identifier
    pub id: String,
    /// Team key (used in issue identifiers)
    pub key: String,
}

/// Linear workflow state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowState {
    /// Unique identifier
    pub id: String,
    /// State name (e.g., "In Progress")
    pub name: String,
}

/// Linear label.
///
/// Labels form a forest: a label with a `parent_id` is nested under that
/// parent, so `version/v1.0.0` is the label `v1.0.0` whose parent is `version`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Label {
    /// Unique identifier
    pub id: String,
    /// Label name (a single path segment)
    pub name: String,
    /// Parent label ID for nested labels
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

/// Linear issue, reduced to the fields the transition runner needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    /// Unique identifier
    pub id: String,
    /// Human-readable identifier (e.g., "ENG-123")
    pub identifier: String,
    /// Current workflow state
    #[serde(default)]
    pub state: Option<WorkflowState>,
    /// IDs of labels currently attached
    #[serde(default)]
    pub label_ids: Vec<String>,
}

/// Input for creating a label
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelCreateInput {
    /// Team the label is scoped to
    pub team_id: String,
    /// Label name (a single path segment)
    pub name: String,
    /// Parent label for nested labels
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

/// Input for updating an issue
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueUpdateInput {
    /// Workflow state ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_id: Option<String>,
    /// Full replacement set of label IDs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label_ids: Option<Vec<String>>,
}

impl IssueUpdateInput {
    /// Update that only moves the issue to another workflow state.
    #[must_use]
    pub fn state(state_id: impl Into<String>) -> Self {
        Self {
            state_id: Some(state_id.into()),
            label_ids: None,
        }
    }
}

/// One unit of transition work, scoped to a single team.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestGroup {
    /// Team key (e.g. "ENG")
    pub team_key: String,
    /// Target workflow state name; `None` leaves states untouched
    pub transition_to: Option<String>,
    /// Allowed source state names; empty allows any state
    pub transition_from: Vec<String>,
    /// Issue numbers within the team
    pub issue_numbers: Vec<u32>,
    /// Label paths to attach (created when missing)
    pub add_labels: Vec<String>,
    /// Label paths or wildcard patterns to detach
    pub remove_labels: Vec<String>,
    /// Substring a label name of a selected issue must contain
    pub filter_label: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_optional_parent() {
        let json = r#"{"id": "l1", "name": "v1.0.0", "parentId": "p1"}"#;
        let label: Label = serde_json::from_str(json).unwrap();
        assert_eq!(label.parent_id.as_deref(), Some("p1"));

        let json = r#"{"id": "l2", "name": "bug"}"#;
        let label: Label = serde_json::from_str(json).unwrap();
        assert!(label.parent_id.is_none());
    }

    #[test]
    fn test_issue_without_state() {
        let json = r#"{"id": "i1", "identifier": "ENG-7", "state": null, "labelIds": ["a"]}"#;
        let issue: Issue = serde_json::from_str(json).unwrap();
        assert!(issue.state.is_none());
        assert_eq!(issue.label_ids, vec!["a".to_string()]);
    }

    #[test]
    fn test_state_only_update_skips_labels() {
        let input = IssueUpdateInput::state("s1");
        let json = serde_json::to_value(&input).unwrap();
        assert_eq!(json, serde_json::json!({ "stateId": "s1" }));
    }

    #[test]
    fn test_label_create_input_omits_missing_parent() {
        let input = LabelCreateInput {
            team_id: "t1".to_string(),
            name: "approved".to_string(),
            parent_id: None,
        };
        let json = serde_json::to_value(&input).unwrap();
        assert_eq!(json, serde_json::json!({ "teamId": "t1", "name": "approved" }));
    }
}
