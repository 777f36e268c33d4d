use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static STRICT_VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\.\d+(?:\.\d+)?$").expect("valid version regex"));

/// A project pinned to one version inside a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectVersion {
    pub name: String,
    pub version: String,
}

impl ProjectVersion {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

/// An immutable snapshot of the project versions that make up one release.
///
/// Manifests are created by the manifest source, persisted once and never
/// mutated. The manifest name is also the release name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub name: String,
    pub project_versions: Vec<ProjectVersion>,
    /// True only if every version is a strict `major.minor[.patch]` number.
    pub is_valid: bool,
}

impl Manifest {
    /// Build a manifest, deriving the validity flag from its versions.
    pub fn new(name: impl Into<String>, project_versions: Vec<ProjectVersion>) -> Self {
        let is_valid = project_versions
            .iter()
            .all(|pv| is_strict_version(&pv.version));
        Self {
            name: name.into(),
            project_versions,
            is_valid,
        }
    }

    /// A manifest whose document could not be read. Never valid.
    pub fn invalid(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            project_versions: Vec::new(),
            is_valid: false,
        }
    }

    pub fn version_of(&self, project: &str) -> Option<&str> {
        self.project_versions
            .iter()
            .find(|pv| pv.name == project)
            .map(|pv| pv.version.as_str())
    }
}

pub fn is_strict_version(version: &str) -> bool {
    STRICT_VERSION.is_match(version)
}

/// Per-project ordered history of release tags, earliest first.
///
/// Ordering is a precondition on whoever supplies the timeline; it is not
/// re-verified.
pub type TagTimeline = Vec<String>;

/// An ordered list of tags belonging to one project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectTags {
    pub project_name: String,
    pub tags: Vec<String>,
}

/// Tags newly introduced by one manifest, per project, in the manifest's
/// project order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestTagWindow {
    pub manifest_name: String,
    pub projects_tags: Vec<ProjectTags>,
}

impl ManifestTagWindow {
    pub fn tags_for(&self, project: &str) -> Option<&[String]> {
        self.projects_tags
            .iter()
            .find(|pt| pt.project_name == project)
            .map(|pt| pt.tags.as_slice())
    }
}

/// Ticket keys mined from git history between a manifest and its predecessor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestTickets {
    pub manifest_name: String,
    pub tickets: BTreeSet<String>,
}

impl ManifestTickets {
    pub fn new<I, S>(manifest_name: impl Into<String>, tickets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            manifest_name: manifest_name.into(),
            tickets: tickets.into_iter().map(Into::into).collect(),
        }
    }
}

/// Two consecutive manifests handed to the ticket miner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestPair {
    pub previous: Manifest,
    pub current: Manifest,
}
