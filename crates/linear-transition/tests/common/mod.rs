//! In-memory Linear used by the integration tests.
//!
//! Label filters are evaluated against the stored label forest the way Linear
//! evaluates them, and every call is recorded for assertions.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use linear_transition::{
    Issue, IssueFilter, IssueUpdateInput, Label, LabelCreateInput, LabelFilter, LabelScope,
    LinearApi, StringComparator, Team, WorkflowState,
};

/// A recorded API call.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    FindTeam(String),
    FindWorkflowStates(Vec<String>),
    FindLabels(LabelFilter, LabelScope),
    CreateLabel(LabelCreateInput),
    FindIssues(IssueFilter),
    AddLabel { issue_id: String, label_id: String },
    RemoveLabel { issue_id: String, label_id: String },
    UpdateIssue { issue_id: String, input: IssueUpdateInput },
}

#[derive(Debug, Default)]
pub struct FakeState {
    pub teams: Vec<Team>,
    pub states: Vec<WorkflowState>,
    pub labels: Vec<Label>,
    pub issues: Vec<Issue>,
    pub calls: Vec<Call>,
    /// Label creation returns no entity
    pub refuse_label_creation: bool,
    /// Issue IDs whose update fails
    pub failing_updates: HashSet<String>,
    next_label: usize,
}

#[derive(Debug, Default)]
pub struct FakeLinear {
    state: Mutex<FakeState>,
}

impl FakeLinear {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fake with one team `ENG` (id `team-id`).
    pub fn with_team() -> Self {
        let fake = Self::new();
        fake.with(|s| {
            s.teams.push(Team {
                id: "team-id".to_string(),
                key: "ENG".to_string(),
            });
        });
        fake
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut FakeState) -> R) -> R {
        let mut state = self.state.lock().unwrap();
        f(&mut state)
    }

    pub fn add_label(&self, id: &str, name: &str, parent_id: Option<&str>) {
        self.with(|s| {
            s.labels.push(Label {
                id: id.to_string(),
                name: name.to_string(),
                parent_id: parent_id.map(str::to_string),
            });
        });
    }

    pub fn add_state(&self, id: &str, name: &str) {
        self.with(|s| {
            s.states.push(WorkflowState {
                id: id.to_string(),
                name: name.to_string(),
            });
        });
    }

    pub fn add_issue(&self, id: &str, identifier: &str, state: Option<(&str, &str)>, label_ids: &[&str]) {
        self.with(|s| {
            s.issues.push(Issue {
                id: id.to_string(),
                identifier: identifier.to_string(),
                state: state.map(|(id, name)| WorkflowState {
                    id: id.to_string(),
                    name: name.to_string(),
                }),
                label_ids: label_ids.iter().map(|l| (*l).to_string()).collect(),
            });
        });
    }

    pub fn calls(&self) -> Vec<Call> {
        self.with(|s| s.calls.clone())
    }

    pub fn created_labels(&self) -> Vec<LabelCreateInput> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::CreateLabel(input) => Some(input),
                _ => None,
            })
            .collect()
    }

    pub fn updates(&self) -> Vec<(String, IssueUpdateInput)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::UpdateIssue { issue_id, input } => Some((issue_id, input)),
                _ => None,
            })
            .collect()
    }

    pub fn issue(&self, id: &str) -> Issue {
        self.with(|s| s.issues.iter().find(|i| i.id == id).cloned().unwrap())
    }

    pub fn label_named(&self, name: &str) -> Vec<Label> {
        self.with(|s| s.labels.iter().filter(|l| l.name == name).cloned().collect())
    }
}

fn comparator_matches(comparator: &StringComparator, value: &str) -> bool {
    match comparator {
        StringComparator::Eq(expected) => value == expected,
        StringComparator::StartsWith(prefix) => value.starts_with(prefix.as_str()),
        StringComparator::EndsWith(suffix) => value.ends_with(suffix.as_str()),
        StringComparator::Contains(part) => value.contains(part.as_str()),
    }
}

fn label_matches(filter: &LabelFilter, label: &Label, labels: &[Label]) -> bool {
    if let Some(or) = &filter.or {
        if !or.iter().any(|clause| label_matches(clause, label, labels)) {
            return false;
        }
    }
    if let Some(id) = &filter.id {
        if !comparator_matches(id, &label.id) {
            return false;
        }
    }
    if let Some(name) = &filter.name {
        if !comparator_matches(name, &label.name) {
            return false;
        }
    }
    if let Some(parent) = &filter.parent {
        // an empty filter object puts no constraint, not even on existence
        if **parent != LabelFilter::default() {
            let parent_label = label
                .parent_id
                .as_ref()
                .and_then(|id| labels.iter().find(|l| &l.id == id));
            match parent_label {
                Some(parent_label) if label_matches(parent, parent_label, labels) => {}
                _ => return false,
            }
        }
    }
    true
}

fn issue_number(identifier: &str) -> Option<u32> {
    identifier.rsplit('-').next()?.parse().ok()
}

#[async_trait]
impl LinearApi for FakeLinear {
    async fn find_team(&self, key: &str) -> Result<Vec<Team>> {
        self.with(|s| {
            s.calls.push(Call::FindTeam(key.to_string()));
            Ok(s.teams.iter().filter(|t| t.key == key).cloned().collect())
        })
    }

    async fn find_workflow_states(&self, names: &[String], _team_id: &str) -> Result<Vec<WorkflowState>> {
        self.with(|s| {
            s.calls.push(Call::FindWorkflowStates(names.to_vec()));
            Ok(s.states
                .iter()
                .filter(|state| names.contains(&state.name))
                .cloned()
                .collect())
        })
    }

    async fn find_labels(&self, filter: &LabelFilter, scope: &LabelScope) -> Result<Vec<Label>> {
        self.with(|s| {
            s.calls.push(Call::FindLabels(filter.clone(), scope.clone()));
            let attached: Option<Vec<String>> = match scope {
                LabelScope::Team(_) => None,
                LabelScope::Issue(issue_id) => Some(
                    s.issues
                        .iter()
                        .find(|i| &i.id == issue_id)
                        .map(|i| i.label_ids.clone())
                        .unwrap_or_default(),
                ),
            };
            Ok(s.labels
                .iter()
                .filter(|label| attached.as_ref().map_or(true, |ids| ids.contains(&label.id)))
                .filter(|label| label_matches(filter, label, &s.labels))
                .cloned()
                .collect())
        })
    }

    async fn create_label(&self, input: LabelCreateInput) -> Result<Option<Label>> {
        self.with(|s| {
            s.calls.push(Call::CreateLabel(input.clone()));
            if s.refuse_label_creation {
                return Ok(None);
            }
            s.next_label += 1;
            let label = Label {
                id: format!("created-{}-{}", input.name, s.next_label),
                name: input.name,
                parent_id: input.parent_id,
            };
            s.labels.push(label.clone());
            Ok(Some(label))
        })
    }

    async fn find_issues(&self, filter: &IssueFilter) -> Result<Vec<Issue>> {
        self.with(|s| {
            s.calls.push(Call::FindIssues(filter.clone()));
            let labels = s.labels.clone();
            Ok(s.issues
                .iter()
                .filter(|issue| {
                    filter.numbers.is_empty()
                        || issue_number(&issue.identifier).is_some_and(|n| filter.numbers.contains(&n))
                })
                .filter(|issue| {
                    filter.label_contains.as_ref().map_or(true, |part| {
                        labels
                            .iter()
                            .any(|l| issue.label_ids.contains(&l.id) && l.name.contains(part.as_str()))
                    })
                })
                .cloned()
                .collect())
        })
    }

    async fn add_label_to_issue(&self, issue_id: &str, label_id: &str) -> Result<()> {
        self.with(|s| -> Result<()> {
            s.calls.push(Call::AddLabel {
                issue_id: issue_id.to_string(),
                label_id: label_id.to_string(),
            });
            let issue = s
                .issues
                .iter_mut()
                .find(|i| i.id == issue_id)
                .ok_or_else(|| anyhow!("Entity not found: Issue"))?;
            if !issue.label_ids.iter().any(|id| id == label_id) {
                issue.label_ids.push(label_id.to_string());
            }
            Ok(())
        })
    }

    async fn remove_label_from_issue(&self, issue_id: &str, label_id: &str) -> Result<()> {
        self.with(|s| -> Result<()> {
            s.calls.push(Call::RemoveLabel {
                issue_id: issue_id.to_string(),
                label_id: label_id.to_string(),
            });
            let issue = s
                .issues
                .iter_mut()
                .find(|i| i.id == issue_id)
                .ok_or_else(|| anyhow!("Entity not found: Issue"))?;
            issue.label_ids.retain(|id| id != label_id);
            Ok(())
        })
    }

    async fn update_issue(&self, issue_id: &str, input: IssueUpdateInput) -> Result<()> {
        self.with(|s| {
            s.calls.push(Call::UpdateIssue {
                issue_id: issue_id.to_string(),
                input: input.clone(),
            });
            if s.failing_updates.contains(issue_id) {
                return Err(anyhow!("Linear API returned error status 500 Internal Server Error"));
            }
            let state = input
                .state_id
                .as_ref()
                .and_then(|id| s.states.iter().find(|state| &state.id == id).cloned());
            if let Some(issue) = s.issues.iter_mut().find(|i| i.id == issue_id) {
                if state.is_some() {
                    issue.state = state;
                }
            }
            Ok(())
        })
    }
}
