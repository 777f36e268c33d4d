//! Server configuration loaded from environment variables.
//!
//! Every variable is prefixed with `RELEASE_PANEL_`. Missing values are not an
//! error at load time; each collaborator has a `check_*` function that the
//! request handlers run before any fetch begins.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::EngineError;

/// Default threshold above which a release's ticket count is logged as suspicious.
pub const DEFAULT_SUSPICIOUS_TICKET_COUNT: usize = 23;

pub const DEFAULT_PAGE_SIZE: usize = 100;

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(120);

const ENV_PREFIX: &str = "RELEASE_PANEL_";

/// A project tracked through git and the manifests.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProjectSettings {
    pub name: String,
    pub git_url: String,
}

#[derive(Clone)]
pub struct AppConfig {
    /// Issue tracker base URL, with a trailing slash.
    pub jira_url: Option<String>,
    pub jira_user: Option<String>,
    pub jira_password: Option<String>,
    pub team_name: Option<String>,
    pub manifest_index_url: Option<String>,
    /// Manifest document URL containing a `{manifestName}` placeholder.
    pub manifest_url_format: Option<String>,
    pub prod_url: Option<String>,
    pub git_repositories_path: Option<PathBuf>,
    pub projects: Vec<ProjectSettings>,
    pub fetch_timeout: Duration,
    pub suspicious_ticket_count: usize,
    pub page_size: usize,
    pub db_path: Option<PathBuf>,
}

const REDACTED: &str = "<redacted>";

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("jira_url", &self.jira_url)
            .field("jira_user", &self.jira_user)
            .field("jira_password", &self.jira_password.as_ref().map(|_| REDACTED))
            .field("team_name", &self.team_name)
            .field("manifest_index_url", &self.manifest_index_url)
            .field("manifest_url_format", &self.manifest_url_format)
            .field("prod_url", &self.prod_url)
            .field("git_repositories_path", &self.git_repositories_path)
            .field("projects", &self.projects)
            .field("fetch_timeout", &self.fetch_timeout)
            .field("suspicious_ticket_count", &self.suspicious_ticket_count)
            .field("page_size", &self.page_size)
            .field("db_path", &self.db_path)
            .finish()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            jira_url: None,
            jira_user: None,
            jira_password: None,
            team_name: None,
            manifest_index_url: None,
            manifest_url_format: None,
            prod_url: None,
            git_repositories_path: None,
            projects: Vec::new(),
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            suspicious_ticket_count: DEFAULT_SUSPICIOUS_TICKET_COUNT,
            page_size: DEFAULT_PAGE_SIZE,
            db_path: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from `RELEASE_PANEL_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(format!("{ENV_PREFIX}{key}")).ok())
    }

    /// Load configuration through an arbitrary key lookup (unprefixed keys).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let jira_url = get("JIRA_URL").map(|url| {
            if url.ends_with('/') {
                url
            } else {
                format!("{}/", url)
            }
        });

        let projects = get("PROJECTS")
            .map(|s| parse_projects(&s))
            .unwrap_or_default();

        let fetch_timeout = get("FETCH_TIMEOUT_SECS")
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_FETCH_TIMEOUT);

        let suspicious_ticket_count = get("SUSPICIOUS_TICKET_COUNT")
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_SUSPICIOUS_TICKET_COUNT);

        let page_size = get("PAGE_SIZE")
            .and_then(|s| s.parse().ok())
            .filter(|&n: &usize| n > 0)
            .unwrap_or(DEFAULT_PAGE_SIZE);

        Self {
            jira_url,
            jira_user: get("JIRA_USER"),
            jira_password: get("JIRA_PASSWORD"),
            team_name: get("TEAM_NAME"),
            manifest_index_url: get("MANIFEST_INDEX_URL"),
            manifest_url_format: get("MANIFEST_URL_FORMAT"),
            prod_url: get("PROD_URL"),
            git_repositories_path: get("GIT_REPOSITORIES_PATH").map(PathBuf::from),
            projects,
            fetch_timeout,
            suspicious_ticket_count,
            page_size,
            db_path: get("DB_PATH").map(PathBuf::from),
        }
    }

    pub fn project_names(&self) -> Vec<String> {
        self.projects.iter().map(|p| p.name.clone()).collect()
    }

    pub fn check_git(&self) -> Result<(), EngineError> {
        require(&self.git_repositories_path, "GIT_REPOSITORIES_PATH")?;
        self.check_projects()
    }

    pub fn check_manifests(&self) -> Result<(), EngineError> {
        require(&self.manifest_index_url, "MANIFEST_INDEX_URL")?;
        require(&self.manifest_url_format, "MANIFEST_URL_FORMAT")?;
        Ok(())
    }

    pub fn check_production(&self) -> Result<(), EngineError> {
        require(&self.prod_url, "PROD_URL")?;
        self.check_projects()
    }

    pub fn check_tracker(&self) -> Result<(), EngineError> {
        require(&self.jira_url, "JIRA_URL")?;
        require(&self.jira_user, "JIRA_USER")?;
        require(&self.jira_password, "JIRA_PASSWORD")?;
        require(&self.team_name, "TEAM_NAME")?;
        Ok(())
    }

    fn check_projects(&self) -> Result<(), EngineError> {
        if self.projects.is_empty() {
            tracing::error!("Configuration error: '{}PROJECTS' is empty", ENV_PREFIX);
            return Err(EngineError::ConfigurationInvalid(format!(
                "{}PROJECTS must list at least one project",
                ENV_PREFIX
            )));
        }
        Ok(())
    }
}

fn require<T>(value: &Option<T>, key: &str) -> Result<(), EngineError> {
    if value.is_none() {
        tracing::error!("Configuration error: '{}{}' must be set", ENV_PREFIX, key);
        return Err(EngineError::ConfigurationInvalid(format!(
            "{}{} must be set",
            ENV_PREFIX, key
        )));
    }
    Ok(())
}

/// Parse `name=git_url` pairs separated by commas. Entries without a URL are
/// skipped.
fn parse_projects(s: &str) -> Vec<ProjectSettings> {
    s.split(',')
        .filter_map(|entry| {
            let (name, url) = entry.split_once('=')?;
            let (name, url) = (name.trim(), url.trim());
            if name.is_empty() || url.is_empty() {
                return None;
            }
            Some(ProjectSettings {
                name: name.to_string(),
                git_url: url.to_string(),
            })
        })
        .collect()
}
