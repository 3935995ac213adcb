//! Step inputs and their split into per-team request groups.
//!
//! CI runners only pass strings, so lists arrive flattened: team keys and
//! issue identifiers are comma-separated, label and state names are one per
//! line. Every input can also be supplied as an `INPUT_<NAME>` environment
//! variable, which is how workflow steps expose their `with:` block.

use std::collections::HashSet;

use clap::Parser;
use tracing::{debug, warn};

use crate::client::LINEAR_API_URL;
use crate::error::RunError;
use crate::models::RequestGroup;

/// Transition Linear issues and update their labels.
#[derive(Debug, Clone, Parser)]
#[command(name = "linear-transition")]
#[command(about = "Transition Linear issues and update their labels")]
#[command(version)]
pub struct Inputs {
    /// Linear API key or OAuth token
    #[arg(long, env = "INPUT_API_KEY", hide_env_values = true)]
    pub api_key: String,

    /// Comma-separated team keys (e.g. "ENG,OPS")
    #[arg(long, env = "INPUT_TEAM_KEY")]
    pub team_key: String,

    /// Workflow state to move issues to; empty leaves states untouched
    #[arg(long, env = "INPUT_TRANSITION_TO", default_value = "")]
    pub transition_to: String,

    /// Newline-separated states issues must be in to be transitioned
    #[arg(long, env = "INPUT_TRANSITION_FROM", default_value = "")]
    pub transition_from: String,

    /// Comma-separated issue identifiers (e.g. "ENG-1,OPS-12")
    #[arg(long, env = "INPUT_ISSUE_IDENTIFIERS", default_value = "")]
    pub issue_identifiers: String,

    /// Newline-separated label paths to add (e.g. "version/v1.2.0")
    #[arg(long, env = "INPUT_ADD_LABELS", default_value = "")]
    pub add_labels: String,

    /// Newline-separated label paths to remove; segments may use `prefix*` or `*suffix`
    #[arg(long, env = "INPUT_REMOVE_LABELS", default_value = "")]
    pub remove_labels: String,

    /// Select issues carrying a label whose name contains this substring
    #[arg(long, env = "INPUT_FILTER_LABEL", default_value = "")]
    pub filter_label: String,

    /// Linear GraphQL endpoint
    #[arg(long, env = "LINEAR_API_URL", default_value = LINEAR_API_URL)]
    pub api_url: String,
}

impl Inputs {
    /// Split the inputs into one request group per team.
    ///
    /// When issue identifiers are given, each team receives the numbers of
    /// its own identifiers and teams without any are dropped. Identifiers of
    /// unknown teams are ignored. Without identifiers, every team gets a group
    /// selecting by the filter label alone.
    pub fn request_groups(&self) -> Result<Vec<RequestGroup>, RunError> {
        let team_keys = unique(split_list(&self.team_key, ','));
        if team_keys.is_empty() {
            return Err(RunError::InvalidInput("no team key provided".to_string()));
        }

        let identifiers = split_list(&self.issue_identifiers, ',');
        let filter_label = non_empty(&self.filter_label);

        if identifiers.is_empty() && filter_label.is_none() {
            return Err(RunError::NothingToSelect);
        }

        let transition_to = non_empty(&self.transition_to);
        let transition_from = unique(split_lines(&self.transition_from));
        let add_labels = split_lines(&self.add_labels);
        let remove_labels = split_lines(&self.remove_labels);

        let groups = team_keys
            .into_iter()
            .filter_map(|team_key| {
                let issue_numbers = issue_numbers(&identifiers, &team_key);

                if !identifiers.is_empty() && issue_numbers.is_empty() {
                    debug!(team = %team_key, "No issue identifiers for team, skipping");
                    return None;
                }

                Some(RequestGroup {
                    team_key,
                    transition_to: transition_to.clone(),
                    transition_from: transition_from.clone(),
                    issue_numbers,
                    add_labels: add_labels.clone(),
                    remove_labels: remove_labels.clone(),
                    filter_label: filter_label.clone(),
                })
            })
            .collect();

        Ok(groups)
    }
}

/// Numbers of the identifiers that belong to `team_key` (`KEY-123` → 123).
fn issue_numbers(identifiers: &[String], team_key: &str) -> Vec<u32> {
    let prefix = format!("{team_key}-");
    let mut seen = HashSet::new();

    identifiers
        .iter()
        .filter_map(|identifier| {
            let number = identifier.strip_prefix(&prefix)?;
            match number.parse::<u32>() {
                Ok(number) => Some(number),
                Err(_) => {
                    warn!("Invalid issue identifier {identifier}. Skipping");
                    None
                }
            }
        })
        .filter(|number| seen.insert(*number))
        .collect()
}

fn split_list(raw: &str, separator: char) -> Vec<String> {
    raw.split(separator)
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn split_lines(raw: &str) -> Vec<String> {
    split_list(raw, '\n')
}

fn non_empty(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn unique(items: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}
