//! Jira REST v2 client.

use std::sync::LazyLock;

use futures::future::BoxFuture;
use regex::Regex;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use super::IssueTracker;
use crate::error::SourceError;
use crate::models::{Ticket, TicketPage, TicketQuery};

/// Ticket keys as they appear in Jira diagnostics.
static TICKET_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)[A-Z]+[-_]\d+").expect("valid ticket key regex"));

const EPIC_LINK_FIELD: &str = "customfield_10008";
const GIT_TAGS_FIELD: &str = "customfield_10900";

const ORDER_BY: &str = "ORDER BY status ASC, team ASC, key DESC";

#[derive(Clone)]
pub struct JiraClient {
    base_url: String,
    user: String,
    password: String,
    team: String,
    client: Client,
}

impl std::fmt::Debug for JiraClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JiraClient")
            .field("base_url", &self.base_url)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("team", &self.team)
            .finish()
    }
}

impl JiraClient {
    /// `base_url` must end with a slash.
    pub fn new(
        base_url: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
        team: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            user: user.into(),
            password: password.into(),
            team: team.into(),
            client: Client::new(),
        }
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .post(format!("{}{}", self.base_url, path))
            .basic_auth(&self.user, Some(&self.password))
    }

    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, SourceError> {
        let status = response.status();
        if status.is_success() {
            Ok(response.json().await?)
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(SourceError::Status {
                status: status.as_u16(),
                body,
            })
        }
    }

    async fn search_page(
        &self,
        query: &TicketQuery,
        start_at: usize,
        page_size: usize,
    ) -> Result<TicketPage, SourceError> {
        let jql = render_jql(&self.team, query);
        tracing::debug!(start_at, page_size, "Searching Jira tickets");

        let response = self
            .post("rest/api/2/search")
            .json(&json!({
                "fields": ["creator", "updated", EPIC_LINK_FIELD, GIT_TAGS_FIELD, "summary", "status"],
                "jql": jql,
                "startAt": start_at,
                "maxResults": page_size,
            }))
            .send()
            .await?;

        let body: Value = self.handle_response(response).await?;
        parse_search_response(&body, &self.base_url)
    }

    async fn probe_unknown_keys(&self, keys: &[String]) -> Result<Vec<String>, SourceError> {
        let jql = render_jql(&self.team, &TicketQuery::keys(keys.to_vec()));
        tracing::trace!(count = keys.len(), "Probing Jira for unknown ticket keys");

        let response = self
            .post("rest/api/2/search")
            .json(&json!({ "jql": jql, "maxResults": 1 }))
            .send()
            .await?;

        if response.status() != StatusCode::BAD_REQUEST {
            return Ok(Vec::new());
        }

        let body = response.text().await?;
        Ok(unknown_keys_from_diagnostic(&body))
    }

    async fn post_filter(&self, name: &str, query: &TicketQuery) -> Result<String, SourceError> {
        let response = self
            .post("rest/api/2/filter")
            .json(&json!({
                "description": format!("List of tasks included in '{}' release.", name),
                "favourite": true,
                "name": name,
                "jql": render_jql(&self.team, query),
            }))
            .send()
            .await?;

        let body: Value = self.handle_response(response).await?;
        body["viewUrl"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| SourceError::Parse("filter response has no viewUrl".to_string()))
    }
}

impl IssueTracker for JiraClient {
    fn search<'a>(
        &'a self,
        query: &'a TicketQuery,
        start_at: usize,
        page_size: usize,
    ) -> BoxFuture<'a, Result<TicketPage, SourceError>> {
        Box::pin(self.search_page(query, start_at, page_size))
    }

    fn unknown_keys<'a>(&'a self, keys: &'a [String]) -> BoxFuture<'a, Result<Vec<String>, SourceError>> {
        Box::pin(self.probe_unknown_keys(keys))
    }

    fn create_filter<'a>(
        &'a self,
        name: &'a str,
        query: &'a TicketQuery,
    ) -> BoxFuture<'a, Result<String, SourceError>> {
        Box::pin(self.post_filter(name, query))
    }
}

/// Render a query as JQL scoped to `team`.
pub fn render_jql(team: &str, query: &TicketQuery) -> String {
    match query {
        TicketQuery::Stories {
            projects_tags,
            keys,
        } => {
            let mut clauses = Vec::new();

            let labels: Vec<String> = projects_tags
                .iter()
                .flat_map(|pt| pt.tags.iter().map(move |tag| format!("{}-{}", pt.project_name, tag)))
                .collect();
            if !labels.is_empty() {
                clauses.push(format!("\"Git Tag\" in ({})", labels.join(",")));
            }

            let mut unique: Vec<&str> = Vec::new();
            for key in keys {
                if !unique.contains(&key.as_str()) {
                    unique.push(key);
                }
            }
            if !unique.is_empty() {
                clauses.push(format!("Key in ({})", unique.join(",")));
            }

            format!(
                "project = \"{}\" AND ({}) {}",
                team,
                clauses.join(" OR "),
                ORDER_BY
            )
        }
        TicketQuery::EpicStories { epic_key } => {
            format!(
                "project = \"{}\" and \"Epic Link\" = \"{}\" {}",
                team, epic_key, ORDER_BY
            )
        }
    }
}

fn parse_search_response(body: &Value, base_url: &str) -> Result<TicketPage, SourceError> {
    let total = body["total"]
        .as_u64()
        .ok_or_else(|| SourceError::Parse("search response has no total".to_string()))?
        as usize;
    let issues = body["issues"]
        .as_array()
        .ok_or_else(|| SourceError::Parse("search response has no issues".to_string()))?;

    let tickets = issues
        .iter()
        .map(|issue| parse_issue(issue, base_url))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(TicketPage { total, tickets })
}

fn parse_issue(issue: &Value, base_url: &str) -> Result<Ticket, SourceError> {
    let key = issue["key"]
        .as_str()
        .ok_or_else(|| SourceError::Parse("issue has no key".to_string()))?
        .to_string();
    let fields = &issue["fields"];
    let text = |v: &Value| v.as_str().unwrap_or_default().to_string();

    let git_tags = fields[GIT_TAGS_FIELD]
        .as_array()
        .map(|tags| {
            tags.iter()
                .filter_map(|t| t.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();

    Ok(Ticket {
        url: format!("{}browse/{}", base_url, key),
        epic_key: fields[EPIC_LINK_FIELD].as_str().map(str::to_string),
        git_tags,
        summary: text(&fields["summary"]),
        status: text(&fields["status"]["name"]),
        author: text(&fields["creator"]["displayName"]),
        updated: text(&fields["updated"]),
        key,
    })
}

fn unknown_keys_from_diagnostic(body: &str) -> Vec<String> {
    TICKET_KEY
        .find_iter(body)
        .map(|m| m.as_str().to_string())
        .collect()
}
