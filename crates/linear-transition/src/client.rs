//! GraphQL client for Linear API.
//!
//! The transition runner talks to Linear only through the [`LinearApi`]
//! trait, so tests can substitute an in-memory implementation.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::filter::{IssueFilter, LabelFilter};
use crate::models::{Issue, IssueUpdateInput, Label, LabelCreateInput, Team, WorkflowState};

/// Linear API endpoint
pub const LINEAR_API_URL: &str = "https://api.linear.app/graphql";

/// Page size for paginated issue queries
const ISSUES_PAGE_SIZE: u32 = 100;

/// Page size for label queries (labels are never paginated further)
const LABELS_PAGE_SIZE: u32 = 250;

/// Where a label lookup searches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelScope {
    /// All labels of a team (by team ID)
    Team(String),
    /// Only the labels attached to an issue (by issue ID)
    Issue(String),
}

/// Operations the transition runner needs from Linear.
#[async_trait]
pub trait LinearApi: Send + Sync {
    /// Teams whose key equals `key` exactly.
    async fn find_team(&self, key: &str) -> Result<Vec<Team>>;

    /// Workflow states of a team whose name is one of `names`.
    async fn find_workflow_states(
        &self,
        names: &[String],
        team_id: &str,
    ) -> Result<Vec<WorkflowState>>;

    /// Labels within `scope` matching `filter`.
    async fn find_labels(&self, filter: &LabelFilter, scope: &LabelScope) -> Result<Vec<Label>>;

    /// Create a label. `Ok(None)` means Linear accepted the call but returned
    /// no label.
    async fn create_label(&self, input: LabelCreateInput) -> Result<Option<Label>>;

    /// All issues matching `filter`.
    async fn find_issues(&self, filter: &IssueFilter) -> Result<Vec<Issue>>;

    /// Attach a label to an issue.
    async fn add_label_to_issue(&self, issue_id: &str, label_id: &str) -> Result<()>;

    /// Detach a label from an issue. The label itself is kept.
    async fn remove_label_from_issue(&self, issue_id: &str, label_id: &str) -> Result<()>;

    /// Update an issue.
    async fn update_issue(&self, issue_id: &str, input: IssueUpdateInput) -> Result<()>;
}

/// Linear GraphQL client
#[derive(Debug, Clone)]
pub struct LinearClient {
    client: reqwest::Client,
    api_url: String,
}

/// GraphQL request body
#[derive(Debug, Serialize)]
struct GraphQLRequest<V: Serialize> {
    query: &'static str,
    variables: V,
}

/// GraphQL response wrapper
#[derive(Debug, Deserialize)]
struct GraphQLResponse<T> {
    data: Option<T>,
    errors: Option<Vec<GraphQLError>>,
}

/// GraphQL error
#[derive(Debug, Deserialize)]
struct GraphQLError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct Connection<T> {
    nodes: Vec<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInfo {
    has_next_page: bool,
    end_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IdRef {
    id: String,
}

/// Label as returned by GraphQL, with the parent as a nested object
#[derive(Debug, Deserialize)]
struct LabelNode {
    id: String,
    name: String,
    #[serde(default)]
    parent: Option<IdRef>,
}

impl From<LabelNode> for Label {
    fn from(node: LabelNode) -> Self {
        Self {
            id: node.id,
            name: node.name,
            parent_id: node.parent.map(|p| p.id),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SuccessResult {
    success: bool,
}

impl LinearClient {
    /// Create a new Linear client with access token.
    ///
    /// # Arguments
    /// * `access_token` - OAuth access token or Personal API key
    ///   - OAuth tokens: Use "Bearer" prefix (handled automatically)
    ///   - API keys (`lin_api_*`): Use token directly without prefix
    ///
    /// # Errors
    /// Returns error if headers cannot be constructed
    pub fn new(access_token: &str) -> Result<Self> {
        Self::with_url(access_token, LINEAR_API_URL)
    }

    /// Create a client against a custom GraphQL endpoint.
    pub fn with_url(access_token: &str, api_url: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();

        let auth_value = if access_token.starts_with("lin_api_") {
            access_token.to_string()
        } else {
            format!("Bearer {access_token}")
        };

        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth_value).context("Invalid access token")?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            api_url: api_url.to_string(),
        })
    }

    /// Execute a GraphQL query/mutation
    async fn execute<V: Serialize, R: DeserializeOwned>(
        &self,
        query: &'static str,
        variables: V,
    ) -> Result<R> {
        let request = GraphQLRequest { query, variables };

        let response = self
            .client
            .post(&self.api_url)
            .json(&request)
            .send()
            .await
            .context("Failed to send request to Linear API")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Linear API returned error status {status}: {body}"));
        }

        let gql_response: GraphQLResponse<R> = response
            .json()
            .await
            .context("Failed to parse Linear API response")?;

        if let Some(errors) = gql_response.errors {
            let error_messages: Vec<_> = errors.iter().map(|e| e.message.as_str()).collect();
            return Err(anyhow!("GraphQL errors: {}", error_messages.join(", ")));
        }

        gql_response
            .data
            .ok_or_else(|| anyhow!("No data in GraphQL response"))
    }

    async fn team_labels(&self, team_id: &str, filter: &LabelFilter) -> Result<Vec<LabelNode>> {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Variables<'a> {
            team_id: &'a str,
            filter: &'a LabelFilter,
            first: u32,
        }

        #[derive(Deserialize)]
        struct Response {
            team: TeamLabels,
        }

        #[derive(Deserialize)]
        struct TeamLabels {
            labels: Connection<LabelNode>,
        }

        const QUERY: &str = r"
            query TeamLabels($teamId: String!, $filter: IssueLabelFilter, $first: Int) {
                team(id: $teamId) {
                    labels(filter: $filter, first: $first) {
                        nodes {
                            id
                            name
                            parent {
                                id
                            }
                        }
                    }
                }
            }
        ";

        let response: Response = self
            .execute(
                QUERY,
                Variables {
                    team_id,
                    filter,
                    first: LABELS_PAGE_SIZE,
                },
            )
            .await?;
        Ok(response.team.labels.nodes)
    }

    async fn issue_labels(&self, issue_id: &str, filter: &LabelFilter) -> Result<Vec<LabelNode>> {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Variables<'a> {
            issue_id: &'a str,
            filter: &'a LabelFilter,
            first: u32,
        }

        #[derive(Deserialize)]
        struct Response {
            issue: IssueLabels,
        }

        #[derive(Deserialize)]
        struct IssueLabels {
            labels: Connection<LabelNode>,
        }

        const QUERY: &str = r"
            query IssueLabels($issueId: String!, $filter: IssueLabelFilter, $first: Int) {
                issue(id: $issueId) {
                    labels(filter: $filter, first: $first) {
                        nodes {
                            id
                            name
                            parent {
                                id
                            }
                        }
                    }
                }
            }
        ";

        let response: Response = self
            .execute(
                QUERY,
                Variables {
                    issue_id,
                    filter,
                    first: LABELS_PAGE_SIZE,
                },
            )
            .await?;
        Ok(response.issue.labels.nodes)
    }
}

#[async_trait]
impl LinearApi for LinearClient {
    #[instrument(skip(self))]
    async fn find_team(&self, key: &str) -> Result<Vec<Team>> {
        #[derive(Serialize)]
        struct Variables<'a> {
            key: &'a str,
        }

        #[derive(Deserialize)]
        struct Response {
            teams: Connection<Team>,
        }

        const QUERY: &str = r"
            query FindTeam($key: String!) {
                teams(filter: { key: { eq: $key } }) {
                    nodes {
                        id
                        key
                    }
                }
            }
        ";

        let response: Response = self.execute(QUERY, Variables { key }).await?;
        Ok(response.teams.nodes)
    }

    #[instrument(skip(self), fields(team_id = %team_id))]
    async fn find_workflow_states(
        &self,
        names: &[String],
        team_id: &str,
    ) -> Result<Vec<WorkflowState>> {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Variables<'a> {
            names: &'a [String],
            team_id: &'a str,
        }

        #[derive(Deserialize)]
        struct Response {
            #[serde(rename = "workflowStates")]
            workflow_states: Connection<WorkflowState>,
        }

        const QUERY: &str = r"
            query FindWorkflowStates($names: [String!]!, $teamId: ID!) {
                workflowStates(filter: { name: { in: $names }, team: { id: { eq: $teamId } } }) {
                    nodes {
                        id
                        name
                    }
                }
            }
        ";

        let response: Response = self.execute(QUERY, Variables { names, team_id }).await?;
        Ok(response.workflow_states.nodes)
    }

    #[instrument(skip(self, filter))]
    async fn find_labels(&self, filter: &LabelFilter, scope: &LabelScope) -> Result<Vec<Label>> {
        let nodes = match scope {
            LabelScope::Team(team_id) => self.team_labels(team_id, filter).await?,
            LabelScope::Issue(issue_id) => self.issue_labels(issue_id, filter).await?,
        };
        debug!(count = nodes.len(), "Labels fetched");
        Ok(nodes.into_iter().map(Label::from).collect())
    }

    #[instrument(skip(self), fields(name = %input.name))]
    async fn create_label(&self, input: LabelCreateInput) -> Result<Option<Label>> {
        #[derive(Serialize)]
        struct Variables {
            input: LabelCreateInput,
        }

        #[derive(Deserialize)]
        struct Response {
            #[serde(rename = "issueLabelCreate")]
            issue_label_create: LabelCreateResult,
        }

        #[derive(Deserialize)]
        struct LabelCreateResult {
            #[serde(rename = "issueLabel")]
            issue_label: Option<LabelNode>,
        }

        const MUTATION: &str = r"
            mutation CreateLabel($input: IssueLabelCreateInput!) {
                issueLabelCreate(input: $input) {
                    success
                    issueLabel {
                        id
                        name
                        parent {
                            id
                        }
                    }
                }
            }
        ";

        let response: Response = self.execute(MUTATION, Variables { input }).await?;
        Ok(response.issue_label_create.issue_label.map(Label::from))
    }

    #[instrument(skip(self), fields(team_id = %filter.team_id))]
    async fn find_issues(&self, filter: &IssueFilter) -> Result<Vec<Issue>> {
        #[derive(Serialize)]
        struct Variables<'a> {
            filter: &'a Value,
            first: u32,
            after: Option<String>,
        }

        #[derive(Deserialize)]
        struct Response {
            issues: IssuesPage,
        }

        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct IssuesPage {
            nodes: Vec<Issue>,
            page_info: PageInfo,
        }

        const QUERY: &str = r"
            query FindIssues($filter: IssueFilter, $first: Int, $after: String) {
                issues(filter: $filter, first: $first, after: $after) {
                    nodes {
                        id
                        identifier
                        state {
                            id
                            name
                        }
                        labelIds
                    }
                    pageInfo {
                        hasNextPage
                        endCursor
                    }
                }
            }
        ";

        let filter = filter.to_graphql();
        let mut issues = Vec::new();
        let mut after = None;

        loop {
            let response: Response = self
                .execute(
                    QUERY,
                    Variables {
                        filter: &filter,
                        first: ISSUES_PAGE_SIZE,
                        after: after.take(),
                    },
                )
                .await?;

            issues.extend(response.issues.nodes);

            match response.issues.page_info {
                PageInfo {
                    has_next_page: true,
                    end_cursor: Some(cursor),
                } => after = Some(cursor),
                _ => break,
            }
        }

        debug!(count = issues.len(), "Issues fetched");
        Ok(issues)
    }

    #[instrument(skip(self))]
    async fn add_label_to_issue(&self, issue_id: &str, label_id: &str) -> Result<()> {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Variables<'a> {
            id: &'a str,
            label_id: &'a str,
        }

        #[derive(Deserialize)]
        struct Response {
            #[serde(rename = "issueAddLabel")]
            issue_add_label: SuccessResult,
        }

        const MUTATION: &str = r"
            mutation IssueAddLabel($id: String!, $labelId: String!) {
                issueAddLabel(id: $id, labelId: $labelId) {
                    success
                }
            }
        ";

        let response: Response = self
            .execute(MUTATION, Variables { id: issue_id, label_id })
            .await?;

        if !response.issue_add_label.success {
            return Err(anyhow!("Failed to add label {label_id} to issue {issue_id}"));
        }

        Ok(())
    }

    #[instrument(skip(self))]
    async fn remove_label_from_issue(&self, issue_id: &str, label_id: &str) -> Result<()> {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Variables<'a> {
            id: &'a str,
            label_id: &'a str,
        }

        #[derive(Deserialize)]
        struct Response {
            #[serde(rename = "issueRemoveLabel")]
            issue_remove_label: SuccessResult,
        }

        const MUTATION: &str = r"
            mutation IssueRemoveLabel($id: String!, $labelId: String!) {
                issueRemoveLabel(id: $id, labelId: $labelId) {
                    success
                }
            }
        ";

        let response: Response = self
            .execute(MUTATION, Variables { id: issue_id, label_id })
            .await?;

        if !response.issue_remove_label.success {
            return Err(anyhow!(
                "Failed to remove label {label_id} from issue {issue_id}"
            ));
        }

        Ok(())
    }

    #[instrument(skip(self, input), fields(issue_id = %issue_id))]
    async fn update_issue(&self, issue_id: &str, input: IssueUpdateInput) -> Result<()> {
        #[derive(Serialize)]
        struct Variables<'a> {
            id: &'a str,
            input: IssueUpdateInput,
        }

        #[derive(Deserialize)]
        struct Response {
            #[serde(rename = "issueUpdate")]
            issue_update: SuccessResult,
        }

        const MUTATION: &str = r"
            mutation UpdateIssue($id: String!, $input: IssueUpdateInput!) {
                issueUpdate(id: $id, input: $input) {
                    success
                }
            }
        ";

        let response: Response = self
            .execute(
                MUTATION,
                Variables {
                    id: issue_id,
                    input,
                },
            )
            .await?;

        if !response.issue_update.success {
            return Err(anyhow!("Failed to update issue"));
        }

        Ok(())
    }
}
