//! Label resolution for a single team.
//!
//! Labels are addressed by path (`version/v1.0.0`). Lookups are batched into
//! one `or` query; labels that are missing get created segment by segment,
//! root first, because Linear only accepts a parent ID on creation.

use std::collections::HashSet;

use futures::future::try_join_all;
use tracing::{debug, info, warn};

use crate::client::{LabelScope, LinearApi};
use crate::error::RunError;
use crate::filter::{LabelFilter, LabelPath};
use crate::models::{Issue, Label, LabelCreateInput};

/// Finds, creates, attaches and detaches labels within one team.
pub struct Labeler<'a, A: LinearApi + ?Sized> {
    client: &'a A,
    team_id: &'a str,
}

impl<'a, A: LinearApi + ?Sized> Labeler<'a, A> {
    #[must_use]
    pub fn new(client: &'a A, team_id: &'a str) -> Self {
        Self { client, team_id }
    }

    /// Attach already resolved labels to an issue.
    pub async fn add_labels(&self, issue: &Issue, labels: &[Label]) -> Result<(), RunError> {
        try_join_all(
            labels
                .iter()
                .map(|label| self.client.add_label_to_issue(&issue.id, &label.id)),
        )
        .await?;

        debug!(issue = %issue.identifier, count = labels.len(), "Labels added");
        Ok(())
    }

    /// Detach every label of `issue` matching one of `patterns`.
    ///
    /// Patterns are label paths whose segments may use `prefix*` or `*suffix`.
    /// Only labels attached to the issue are considered, and finding none is
    /// not an error. The labels themselves are kept in Linear.
    ///
    /// Returns the number of labels detached.
    pub async fn remove_labels(&self, issue: &Issue, patterns: &[String]) -> Result<usize, RunError> {
        let clauses: Vec<LabelFilter> = patterns
            .iter()
            .map(|pattern| LabelPath::parse(pattern))
            .filter(|path| !path.is_empty())
            .map(|path| path.pattern_filter())
            .collect();

        if clauses.is_empty() {
            return Ok(0);
        }

        let filter = LabelFilter::any_of(clauses);

        let labels = self
            .client
            .find_labels(&filter, &LabelScope::Issue(issue.id.clone()))
            .await?;

        if labels.is_empty() {
            warn!(
                "No labels matching {patterns:?} found on issue {}. Nothing to remove",
                issue.identifier
            );
            return Ok(0);
        }

        try_join_all(
            labels
                .iter()
                .map(|label| self.client.remove_label_from_issue(&issue.id, &label.id)),
        )
        .await?;

        debug!(issue = %issue.identifier, count = labels.len(), "Labels removed");
        Ok(labels.len())
    }

    /// Resolve label paths to labels, creating whatever does not exist yet.
    ///
    /// Found labels come first, then created ones. Duplicate names are
    /// resolved once.
    pub async fn find_or_create_labels(&self, names: &[String]) -> Result<Vec<Label>, RunError> {
        let mut seen = HashSet::new();
        let paths: Vec<LabelPath> = names
            .iter()
            .filter(|name| seen.insert(name.as_str()))
            .map(|name| LabelPath::parse(name))
            .filter(|path| {
                if path.is_empty() {
                    warn!("Label \"{path}\" has no name. Skipping");
                }
                !path.is_empty()
            })
            .collect();

        if paths.is_empty() {
            return Ok(Vec::new());
        }

        let found = self.find_labels(&paths).await?;

        let missing: Vec<&LabelPath> = paths
            .iter()
            .zip(&found)
            .filter(|(_, label)| label.is_none())
            .map(|(path, _)| path)
            .collect();

        // Creations run concurrently. Two paths sharing a missing ancestor may
        // both create it, since each only checks for it right before creating.
        let created = try_join_all(missing.into_iter().map(|path| async move {
            let label = self.create_label(path).await?;
            info!("Label \"{path}\" was created.");
            Ok::<_, RunError>(label)
        }))
        .await?;

        Ok(found.into_iter().flatten().chain(created).collect())
    }

    /// Look up all paths with a single query.
    ///
    /// Results are matched back to paths by leaf name only, so two paths with
    /// the same leaf (`a/v1`, `b/v1`) may both receive the same label.
    async fn find_labels(&self, paths: &[LabelPath]) -> Result<Vec<Option<Label>>, RunError> {
        let filter = LabelFilter::any_of(paths.iter().map(LabelPath::exact_filter).collect());

        let labels = self
            .client
            .find_labels(&filter, &LabelScope::Team(self.team_id.to_string()))
            .await?;

        Ok(paths
            .iter()
            .map(|path| labels.iter().find(|label| label.name == path.leaf()).cloned())
            .collect())
    }

    /// Find a single label segment by exact name under `parent_id`.
    async fn find_label(&self, name: &str, parent_id: Option<&str>) -> Result<Option<Label>, RunError> {
        let labels = self
            .client
            .find_labels(
                &LabelFilter::segment(name, parent_id),
                &LabelScope::Team(self.team_id.to_string()),
            )
            .await?;

        Ok(labels.into_iter().next())
    }

    /// Ensure every segment of `path` exists, root first, and return the leaf.
    async fn create_label(&self, path: &LabelPath) -> Result<Label, RunError> {
        let segments = path.segments();
        let mut current: Option<Label> = None;

        for (depth, segment) in segments.iter().enumerate() {
            let parent_id = current.as_ref().map(|label| label.id.clone());

            let label = match self.find_label(segment, parent_id.as_deref()).await? {
                Some(existing) => Some(existing),
                None => self
                    .client
                    .create_label(LabelCreateInput {
                        team_id: self.team_id.to_string(),
                        name: segment.clone(),
                        parent_id,
                    })
                    .await?
                    .filter(|label| !label.id.is_empty()),
            };

            match label {
                Some(label) => current = Some(label),
                None => {
                    return Err(RunError::LabelNotCreated {
                        name: segments[depth..].join("/"),
                    })
                }
            }
        }

        current.ok_or_else(|| RunError::LabelNotCreated {
            name: path.to_string(),
        })
    }
}
