//! Release correlation engine.
//!
//! Combines three independently sourced timelines (manifests, git tags and
//! tracker tickets) into per-release ticket lists and named release ranges.
//!
//! - [`tag_window`]: which tags each manifest introduced, per project.
//! - [`cache`]: mined ticket keys per manifest, cached forever.
//! - [`correlator`]: merges mined keys and tag cross-references into tickets.
//! - [`range`]: resolves a named start/end pair into tags and tickets.
//! - [`paginate`]: reads every page of a tracker search.
//!
//! [`ReleaseEngine`] ties them together for the report operations.

pub mod cache;
pub mod correlator;
pub mod paginate;
pub mod range;
pub mod tag_window;

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;

use futures::{StreamExt, TryStreamExt};

pub use cache::{CachedMiner, TicketCache};

use crate::config::AppConfig;
use crate::db::Database;
use crate::error::{EngineError, SourceError};
use crate::models::*;
use crate::sources::{
    GitRepositories, HttpManifestSource, IssueTracker, JiraClient, ManifestSource,
    ProductionMonitor, ProductionMonitorClient, TagSource, TicketMiner,
};

/// Upper bound on concurrent manifest downloads.
const MANIFEST_DOWNLOAD_CONCURRENCY: usize = 10;

/// The external systems a [`ReleaseEngine`] talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub manifests: Arc<dyn ManifestSource>,
    pub tags: Arc<dyn TagSource>,
    pub miner: Arc<dyn TicketMiner>,
    pub tracker: Arc<dyn IssueTracker>,
    pub production: Arc<dyn ProductionMonitor>,
    pub cache: Arc<dyn TicketCache>,
}

impl Collaborators {
    /// The production backends: HTTP manifest index, local git mirrors, Jira
    /// and the production monitor, with `db` as manifest store and ticket cache.
    ///
    /// Missing configuration values are left empty here; the engine checks
    /// them before every request.
    pub fn from_config(config: &AppConfig, db: Database) -> Self {
        let text = |v: &Option<String>| v.clone().unwrap_or_default();

        let git = Arc::new(GitRepositories::new(
            config.git_repositories_path.clone().unwrap_or_default(),
            config.projects.clone(),
        ));

        Self {
            manifests: Arc::new(HttpManifestSource::new(
                text(&config.manifest_index_url),
                text(&config.manifest_url_format),
                db.clone(),
            )),
            tags: git.clone(),
            miner: git,
            tracker: Arc::new(JiraClient::new(
                text(&config.jira_url),
                text(&config.jira_user),
                text(&config.jira_password),
                text(&config.team_name),
            )),
            production: Arc::new(ProductionMonitorClient::new(
                text(&config.prod_url),
                config.project_names(),
            )),
            cache: Arc::new(db),
        }
    }
}

#[derive(Clone)]
pub struct ReleaseEngine {
    config: Arc<AppConfig>,
    manifests: Arc<dyn ManifestSource>,
    tags: Arc<dyn TagSource>,
    tracker: Arc<dyn IssueTracker>,
    production: Arc<dyn ProductionMonitor>,
    tickets: CachedMiner,
}

impl ReleaseEngine {
    pub fn new(config: AppConfig, collaborators: Collaborators) -> Self {
        let tickets = CachedMiner::new(
            collaborators.cache,
            collaborators.miner,
            config.fetch_timeout,
        );
        Self {
            config: Arc::new(config),
            manifests: collaborators.manifests,
            tags: collaborators.tags,
            tracker: collaborators.tracker,
            production: collaborators.production,
            tickets,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Run an external fetch under the configured timeout.
    async fn bounded<T>(
        &self,
        what: &str,
        fut: impl Future<Output = Result<T, SourceError>>,
    ) -> Result<T, SourceError> {
        match tokio::time::timeout(self.config.fetch_timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                tracing::error!("Timed out waiting for {}", what);
                Err(SourceError::Timeout(what.to_string()))
            }
        }
    }

    // ============================================================
    // Manifests and production
    // ============================================================

    /// All valid manifests, oldest first.
    pub async fn list_manifests(&self) -> Result<Vec<Manifest>, EngineError> {
        self.config.check_manifests()?;
        Ok(self.load_manifests().await?)
    }

    async fn load_manifests(&self) -> Result<Vec<Manifest>, SourceError> {
        tracing::trace!("Loading manifest names");
        let names = self.bounded("manifest index", self.manifests.list_names()).await?;

        let manifests: Vec<Manifest> = futures::stream::iter(names)
            .map(|name| async move {
                self.bounded("manifest download", self.manifests.fetch(&name))
                    .await
            })
            .buffered(MANIFEST_DOWNLOAD_CONCURRENCY)
            .try_collect()
            .await?;

        let total = manifests.len();
        let valid: Vec<Manifest> = manifests.into_iter().filter(|m| m.is_valid).collect();
        tracing::debug!(total, valid = valid.len(), "Loaded manifests");
        Ok(valid)
    }

    pub async fn production_versions(&self) -> Result<Vec<ProjectVersion>, EngineError> {
        self.config.check_production()?;
        Ok(self
            .bounded("production versions", self.production.production_versions())
            .await?)
    }

    // ============================================================
    // Tags and tickets
    // ============================================================

    /// Tag windows for `manifests`, oldest first.
    pub async fn tag_windows(&self, manifests: &[Manifest]) -> Result<Vec<ManifestTagWindow>, EngineError> {
        if manifests.is_empty() {
            return Ok(Vec::new());
        }
        let projects = self.config.project_names();
        let timelines = self.bounded("git tags", self.tags.tags(&projects)).await?;
        Ok(tag_window::resolve(manifests, &timelines))
    }

    pub async fn manifest_tickets(&self, manifests: &[Manifest]) -> Result<Vec<ManifestTickets>, EngineError> {
        self.tickets.tickets_for(manifests).await
    }

    /// Every ticket matching `query`, across all pages.
    pub async fn search_tickets(&self, query: &TicketQuery) -> Result<Vec<Ticket>, EngineError> {
        if query.is_empty() {
            return Ok(Vec::new());
        }
        paginate::accumulate(
            self.tracker.as_ref(),
            query,
            self.config.page_size,
            self.config.fetch_timeout,
        )
        .await
    }

    pub async fn stories_for_epic(&self, epic_key: &str) -> Result<Vec<Ticket>, EngineError> {
        if epic_key.trim().is_empty() {
            return Err(EngineError::InvalidInput("Epic key must not be empty.".to_string()));
        }
        self.config.check_tracker()?;
        self.search_tickets(&TicketQuery::EpicStories {
            epic_key: epic_key.to_string(),
        })
        .await
    }

    // ============================================================
    // Reports
    // ============================================================

    pub async fn upcoming_releases(&self) -> Result<UpcomingReleasesReport, EngineError> {
        tracing::trace!("Getting upcoming releases");
        self.config.check_git()?;
        self.config.check_production()?;
        self.config.check_manifests()?;
        self.config.check_tracker()?;

        let projects = self.config.project_names();
        let (_, production_versions, manifests) = tokio::try_join!(
            self.bounded("git refresh", self.tags.refresh(&projects)),
            self.bounded("production versions", self.production.production_versions()),
            self.load_manifests(),
        )?;

        let (mined, windows) = tokio::try_join!(
            self.manifest_tickets(&manifests),
            self.tag_windows(&manifests),
        )?;

        let keys = distinct_keys(&mined);
        let unknown: HashSet<String> = if keys.is_empty() {
            HashSet::new()
        } else {
            self.bounded("unknown ticket probe", self.tracker.unknown_keys(&keys))
                .await?
                .into_iter()
                .collect()
        };
        if !unknown.is_empty() {
            tracing::warn!(count = unknown.len(), "Dropping ticket keys unknown to the tracker");
        }
        let valid_keys: Vec<String> = keys.into_iter().filter(|k| !unknown.contains(k)).collect();

        let stories = self
            .search_tickets(&TicketQuery::Stories {
                projects_tags: merge_project_tags(&windows),
                keys: valid_keys,
            })
            .await?;

        let epic_keys = distinct_epic_keys(&stories);
        let epics = self.search_tickets(&TicketQuery::keys(epic_keys)).await?;

        let mined_by_name: HashMap<&str, &ManifestTickets> =
            mined.iter().map(|m| (m.manifest_name.as_str(), m)).collect();
        let windows_by_name: HashMap<&str, &ManifestTagWindow> =
            windows.iter().map(|w| (w.manifest_name.as_str(), w)).collect();

        let releases_tickets: Vec<Release> = manifests
            .iter()
            .map(|manifest| Release {
                name: manifest.name.clone(),
                tickets: correlator::correlate(
                    manifest,
                    mined_by_name.get(manifest.name.as_str()).copied(),
                    windows_by_name.get(manifest.name.as_str()).copied(),
                    &stories,
                    self.config.suspicious_ticket_count,
                ),
            })
            .collect();

        tracing::info!(
            releases = releases_tickets.len(),
            stories = stories.len(),
            epics = epics.len(),
            "Built upcoming releases report"
        );

        Ok(UpcomingReleasesReport {
            epics,
            production_versions,
            releases_tickets,
            upcoming_releases: manifests,
        })
    }

    /// Tags and tickets for the inclusive range `start..=end`.
    pub async fn release_range(&self, start: &str, end: &str) -> Result<ReleaseRange, EngineError> {
        self.config.check_manifests()?;
        self.config.check_git()?;

        let manifests = self.load_manifests().await?;
        let selected = range::select_range(&manifests, start, end)?;

        // Tag cursors need the full history; mining needs the range plus the
        // manifest before it, so the range's first release has a predecessor.
        let first = manifests
            .iter()
            .position(|m| m.name == selected[0].name)
            .unwrap_or(0);
        let last = first + selected.len();
        let to_mine = &manifests[first.saturating_sub(1)..last];

        let (windows, mined) = tokio::try_join!(
            self.tag_windows(&manifests),
            self.manifest_tickets(to_mine),
        )?;

        range::resolve_range(&manifests, &windows, &mined, start, end)
    }

    /// Create a tracker filter covering the releases from `start` to `end`.
    pub async fn create_release_filter(&self, start: &str, end: &str) -> Result<ReleaseRangeResult, EngineError> {
        if start.trim().is_empty() {
            return Err(EngineError::InvalidInput("StartReleaseName must not be empty.".to_string()));
        }
        if end.trim().is_empty() {
            return Err(EngineError::InvalidInput("EndReleaseName must not be empty.".to_string()));
        }
        self.config.check_tracker()?;

        let range = self.release_range(start, end).await?;
        tracing::debug!(
            manifests = range.manifests.len(),
            tickets = range.tickets.len(),
            "Creating release filter"
        );

        let query = TicketQuery::Stories {
            projects_tags: range.projects_tags,
            keys: range.tickets,
        };
        let url = self
            .bounded("filter creation", self.tracker.create_filter(end, &query))
            .await?;

        Ok(ReleaseRangeResult {
            name: end.to_string(),
            url,
        })
    }
}

/// Distinct mined ticket keys in first-seen order.
fn distinct_keys(mined: &[ManifestTickets]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut keys = Vec::new();
    for key in mined.iter().flat_map(|m| m.tickets.iter()) {
        if seen.insert(key.as_str()) {
            keys.push(key.clone());
        }
    }
    keys
}

fn distinct_epic_keys(tickets: &[Ticket]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut keys = Vec::new();
    for epic in tickets.iter().filter_map(|t| t.epic_key.as_deref()) {
        if !epic.is_empty() && seen.insert(epic) {
            keys.push(epic.to_string());
        }
    }
    keys
}

/// Concatenate every window's tags per project, in first-seen project order.
fn merge_project_tags(windows: &[ManifestTagWindow]) -> Vec<ProjectTags> {
    let mut merged: Vec<ProjectTags> = Vec::new();
    for project in windows.iter().flat_map(|w| w.projects_tags.iter()) {
        match merged.iter_mut().find(|m| m.project_name == project.project_name) {
            Some(existing) => existing.tags.extend(project.tags.iter().cloned()),
            None => merged.push(project.clone()),
        }
    }
    merged
}
