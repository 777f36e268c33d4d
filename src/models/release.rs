use serde::{Deserialize, Serialize};

use super::{Manifest, ProjectTags, ProjectVersion, Ticket};

/// A manifest with its correlated tickets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Release {
    pub name: String,
    pub tickets: Vec<Ticket>,
}

/// Tags and ticket keys spanning an inclusive, named range of manifests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseRange {
    /// Names of the manifests inside the range, oldest first.
    pub manifests: Vec<String>,
    pub projects_tags: Vec<ProjectTags>,
    pub tickets: Vec<String>,
}

/// A tracker filter created for a release range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseRangeResult {
    pub name: String,
    pub url: String,
}

/// Input for creating a release filter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReleaseFilterInput {
    pub start_release_name: String,
    pub end_release_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpcomingReleasesReport {
    pub epics: Vec<Ticket>,
    pub production_versions: Vec<ProjectVersion>,
    pub releases_tickets: Vec<Release>,
    pub upcoming_releases: Vec<Manifest>,
}
