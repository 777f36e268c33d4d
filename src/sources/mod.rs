//! External collaborators consumed by the release engine.
//!
//! Each collaborator is a trait so the engine can run against the real
//! network/git backends or against in-memory fakes in tests. Methods return
//! boxed futures to keep the traits object safe.

mod git;
mod jira;
mod manifests;
mod production;

pub use git::GitRepositories;
pub use jira::{render_jql, JiraClient};
pub use manifests::HttpManifestSource;
pub use production::ProductionMonitorClient;

use std::collections::HashMap;

use futures::future::BoxFuture;

use crate::error::SourceError;
use crate::models::{Manifest, ManifestPair, ManifestTickets, ProjectVersion, TagTimeline, TicketPage, TicketQuery};

/// Where manifests come from.
pub trait ManifestSource: Send + Sync {
    /// All manifest names, oldest first.
    fn list_names(&self) -> BoxFuture<'_, Result<Vec<String>, SourceError>>;

    fn fetch<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<Manifest, SourceError>>;
}

/// Per-project release tag history.
pub trait TagSource: Send + Sync {
    /// Bring local mirrors of the projects up to date.
    fn refresh<'a>(&'a self, projects: &'a [String]) -> BoxFuture<'a, Result<(), SourceError>>;

    /// Tag timelines keyed by project name, each ordered earliest first.
    ///
    /// Any per-project failure fails the whole call.
    fn tags<'a>(
        &'a self,
        projects: &'a [String],
    ) -> BoxFuture<'a, Result<HashMap<String, TagTimeline>, SourceError>>;
}

/// Extracts ticket keys touched between consecutive manifests.
pub trait TicketMiner: Send + Sync {
    /// Mine every pair in one batch. Returns one entry per pair's current
    /// manifest.
    fn mine(&self, pairs: Vec<ManifestPair>) -> BoxFuture<'_, Result<Vec<ManifestTickets>, SourceError>>;
}

pub trait IssueTracker: Send + Sync {
    fn search<'a>(
        &'a self,
        query: &'a TicketQuery,
        start_at: usize,
        page_size: usize,
    ) -> BoxFuture<'a, Result<TicketPage, SourceError>>;

    /// Keys the tracker does not know about.
    fn unknown_keys<'a>(&'a self, keys: &'a [String]) -> BoxFuture<'a, Result<Vec<String>, SourceError>>;

    /// Save `query` as a named filter and return its view URL.
    fn create_filter<'a>(
        &'a self,
        name: &'a str,
        query: &'a TicketQuery,
    ) -> BoxFuture<'a, Result<String, SourceError>>;
}

/// Versions currently deployed to production.
pub trait ProductionMonitor: Send + Sync {
    fn production_versions(&self) -> BoxFuture<'_, Result<Vec<ProjectVersion>, SourceError>>;
}
