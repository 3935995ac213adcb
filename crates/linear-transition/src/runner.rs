//! Transition runner.
//!
//! A request group is processed as a fixed pipeline:
//!
//! 1. resolve the team by key
//! 2. resolve the issues (by number and/or label filter)
//! 3. resolve the target and allowed source states, if a transition is requested
//! 4. detach labels matching the remove patterns from every issue
//! 5. resolve or create the labels to add once, and attach them to every issue
//! 6. move every eligible issue to the target state
//!
//! Removal runs before addition so that a pattern such as `version/v*` never
//! detaches a label added in the same run. Validation failures in steps 1-3
//! abort the group; a failed update in step 6 is recorded and the remaining
//! issues are still processed.

use futures::future::{join_all, try_join_all};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::client::LinearApi;
use crate::error::RunError;
use crate::filter::IssueFilter;
use crate::labeler::Labeler;
use crate::models::{Issue, IssueUpdateInput, RequestGroup, Team, WorkflowState};

/// What happened to one issue during the transition step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// State was updated
    Updated,
    /// Issue has no current state
    MissingState,
    /// Current state is not one of the allowed source states
    NotAllowed { state: String },
    /// Linear rejected the update
    Failed { message: String },
}

/// Summary of a completed request group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupReport {
    pub team_key: String,
    /// Number of issues matched
    pub issues: usize,
    /// Labels detached across all issues
    pub labels_removed: usize,
    /// Labels attached to each issue
    pub labels_added: usize,
    /// Per-issue transition outcomes, keyed by issue identifier
    pub transitions: Vec<(String, TransitionOutcome)>,
}

impl GroupReport {
    fn new(team_key: &str, issues: usize) -> Self {
        Self {
            team_key: team_key.to_string(),
            issues,
            ..Self::default()
        }
    }

    /// Number of issues whose state was updated.
    #[must_use]
    pub fn updated(&self) -> usize {
        self.transitions
            .iter()
            .filter(|(_, outcome)| *outcome == TransitionOutcome::Updated)
            .count()
    }

    /// Issues whose update failed, with the error message.
    pub fn failures(&self) -> impl Iterator<Item = (&str, &str)> {
        self.transitions
            .iter()
            .filter_map(|(identifier, outcome)| match outcome {
                TransitionOutcome::Failed { message } => {
                    Some((identifier.as_str(), message.as_str()))
                }
                _ => None,
            })
    }

    /// True when no per-issue update failed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failures().next().is_none()
    }
}

/// Resolved transition target.
#[derive(Debug, Clone)]
struct TransitionTarget {
    to: WorkflowState,
    allowed_from_ids: Vec<String>,
}

/// Immutable state shared by the pipeline steps of one group.
struct GroupContext<'a, A: LinearApi + ?Sized> {
    client: &'a A,
    team: Team,
}

/// Runs request groups against Linear.
pub struct Runner<'a, A: LinearApi + ?Sized> {
    client: &'a A,
}

impl<'a, A: LinearApi + ?Sized> Runner<'a, A> {
    #[must_use]
    pub fn new(client: &'a A) -> Self {
        Self { client }
    }

    /// Run all groups concurrently.
    ///
    /// A group that fails aborts only itself; the result of every group is
    /// returned together with its team key, in input order.
    pub async fn run_groups(
        &self,
        groups: &[RequestGroup],
    ) -> Vec<(String, Result<GroupReport, RunError>)> {
        join_all(
            groups
                .iter()
                .map(|group| async move { (group.team_key.clone(), self.run(group).await) }),
        )
        .await
    }

    /// Run the full pipeline for one group.
    pub async fn run(&self, group: &RequestGroup) -> Result<GroupReport, RunError> {
        let team = fetch_team(self.client, &group.team_key).await?;
        let ctx = GroupContext {
            client: self.client,
            team,
        };

        let issues = fetch_issues(&ctx, group).await?;
        let mut report = GroupReport::new(&group.team_key, issues.len());

        if issues.is_empty() {
            info!("No issues found for team {}. Nothing to do", group.team_key);
            return Ok(report);
        }

        let target = match &group.transition_to {
            Some(to) => Some(fetch_states(&ctx, to, &group.transition_from).await?),
            None => None,
        };

        let labeler = Labeler::new(ctx.client, &ctx.team.id);
        report.labels_removed = remove_labels(&labeler, &issues, &group.remove_labels).await?;
        report.labels_added = add_labels(&labeler, &issues, &group.add_labels).await?;

        if let Some(target) = target {
            report.transitions = transition_issues(&ctx, &issues, &target).await;
        }

        Ok(report)
    }
}

/// Fetch the team by key. Exactly one must match.
async fn fetch_team<A: LinearApi + ?Sized>(client: &A, key: &str) -> Result<Team, RunError> {
    let teams = client.find_team(key).await?;

    debug!("Team found: {}", to_json(&teams));
    assert_count(&teams, 1)?;

    teams.into_iter().next().ok_or(RunError::CountMismatch)
}

/// Fetch the issues to update.
///
/// Without a label filter every requested number must be found. With a label
/// filter the count may legitimately differ.
async fn fetch_issues<A: LinearApi + ?Sized>(
    ctx: &GroupContext<'_, A>,
    group: &RequestGroup,
) -> Result<Vec<Issue>, RunError> {
    // a blank filter would match every labelled issue of the team
    let filter_label = group
        .filter_label
        .as_deref()
        .map(str::trim)
        .filter(|label| !label.is_empty());

    if group.issue_numbers.is_empty() && filter_label.is_none() {
        return Err(RunError::NothingToSelect);
    }

    let filter = IssueFilter {
        team_id: ctx.team.id.clone(),
        numbers: group.issue_numbers.clone(),
        label_contains: filter_label.map(str::to_string),
    };

    let issues = ctx.client.find_issues(&filter).await?;
    debug!("Issues found: {}", to_json(&issues));

    if filter_label.is_none() {
        assert_count(&issues, group.issue_numbers.len())?;
    }

    Ok(issues)
}

/// Fetch the target state and the allowed source states in one query.
async fn fetch_states<A: LinearApi + ?Sized>(
    ctx: &GroupContext<'_, A>,
    transition_to: &str,
    transition_from: &[String],
) -> Result<TransitionTarget, RunError> {
    let mut names = vec![transition_to.to_string()];
    names.extend(
        transition_from
            .iter()
            .filter(|name| name.as_str() != transition_to)
            .cloned(),
    );

    let states = ctx.client.find_workflow_states(&names, &ctx.team.id).await?;

    let to_states: Vec<&WorkflowState> = states
        .iter()
        .filter(|state| state.name == transition_to)
        .collect();
    debug!("Transition to state found: {}", to_json(&to_states));
    assert_count(&to_states, 1)?;

    let from_states: Vec<&WorkflowState> = states
        .iter()
        .filter(|state| transition_from.contains(&state.name))
        .collect();
    debug!("Transition from states found: {}", to_json(&from_states));
    assert_count(&from_states, transition_from.len())?;

    Ok(TransitionTarget {
        to: to_states[0].clone(),
        allowed_from_ids: from_states.iter().map(|state| state.id.clone()).collect(),
    })
}

async fn remove_labels<A: LinearApi + ?Sized>(
    labeler: &Labeler<'_, A>,
    issues: &[Issue],
    patterns: &[String],
) -> Result<usize, RunError> {
    if patterns.is_empty() {
        return Ok(0);
    }

    let removed = try_join_all(
        issues
            .iter()
            .map(|issue| labeler.remove_labels(issue, patterns)),
    )
    .await?;

    Ok(removed.into_iter().sum())
}

async fn add_labels<A: LinearApi + ?Sized>(
    labeler: &Labeler<'_, A>,
    issues: &[Issue],
    names: &[String],
) -> Result<usize, RunError> {
    if names.is_empty() {
        return Ok(0);
    }

    let labels = labeler.find_or_create_labels(names).await?;

    try_join_all(issues.iter().map(|issue| labeler.add_labels(issue, &labels))).await?;

    Ok(labels.len())
}

async fn transition_issues<A: LinearApi + ?Sized>(
    ctx: &GroupContext<'_, A>,
    issues: &[Issue],
    target: &TransitionTarget,
) -> Vec<(String, TransitionOutcome)> {
    join_all(issues.iter().map(|issue| async move {
        let outcome = transition_issue(ctx, issue, target).await;
        (issue.identifier.clone(), outcome)
    }))
    .await
}

/// Move one issue to the target state.
///
/// Never fails: every problem is logged and reported as an outcome so that
/// the other issues of the group are still processed.
async fn transition_issue<A: LinearApi + ?Sized>(
    ctx: &GroupContext<'_, A>,
    issue: &Issue,
    target: &TransitionTarget,
) -> TransitionOutcome {
    let Some(state) = &issue.state else {
        warn!("Can't get state for issue {}. Skipping", issue.identifier);
        return TransitionOutcome::MissingState;
    };

    if !target.allowed_from_ids.is_empty() && !target.allowed_from_ids.contains(&state.id) {
        warn!(
            "Issue {} is not in whitelisted state ({}). Skipping",
            issue.identifier, state.name
        );
        return TransitionOutcome::NotAllowed {
            state: state.name.clone(),
        };
    }

    match ctx
        .client
        .update_issue(&issue.id, IssueUpdateInput::state(&target.to.id))
        .await
    {
        Ok(()) => {
            info!("Issue {} updated!", issue.identifier);
            TransitionOutcome::Updated
        }
        Err(e) => {
            error!(
                "Unexpected error happened updating {}: {e}. Continuing with other issues",
                issue.identifier
            );
            TransitionOutcome::Failed {
                message: e.to_string(),
            }
        }
    }
}

fn assert_count<T>(found: &[T], expected: usize) -> Result<(), RunError> {
    if found.len() == expected {
        Ok(())
    } else {
        Err(RunError::CountMismatch)
    }
}

fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_default()
}
