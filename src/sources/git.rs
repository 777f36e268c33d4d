//! Local git mirrors of the tracked projects.
//!
//! Tags and commit history are read with the system `git` binary. Release tags
//! are named `release/<major>.<minor>[.<patch>]`.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use futures::future::{try_join_all, BoxFuture};
use regex::Regex;
use tokio::process::Command;

use super::{TagSource, TicketMiner};
use crate::config::ProjectSettings;
use crate::error::SourceError;
use crate::models::{ManifestPair, ManifestTickets, TagTimeline};

static RELEASE_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"release/(\d+\.\d+(?:\.\d+)?)").expect("valid release tag regex"));

static COMMIT_TICKET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Z]+[-_]\d+").expect("valid ticket key regex"));

#[derive(Debug, Clone)]
pub struct GitRepositories {
    root: PathBuf,
    projects: Vec<ProjectSettings>,
}

impl GitRepositories {
    pub fn new(root: impl Into<PathBuf>, projects: Vec<ProjectSettings>) -> Self {
        Self {
            root: root.into(),
            projects,
        }
    }

    fn project_path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    fn git_cmd(&self, dir: &Path) -> Command {
        let mut cmd = Command::new("git");
        cmd.arg("-C").arg(dir).kill_on_drop(true);
        cmd
    }

    /// Run git and return stdout, failing on a non-zero exit.
    async fn run(&self, dir: &Path, args: &[&str]) -> Result<String, SourceError> {
        let output = self.git_cmd(dir).args(args).output().await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SourceError::Command {
                command: format!("git {}", args.join(" ")),
                stderr: stderr.trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn ensure_cloned(&self, project: &ProjectSettings) -> Result<(), SourceError> {
        let path = self.project_path(&project.name);
        if tokio::fs::try_exists(&path).await? {
            tracing::trace!(project = %project.name, "Project already cloned");
            return Ok(());
        }

        tracing::info!(project = %project.name, path = %path.display(), "Cloning project");
        let path_arg = path.to_string_lossy().into_owned();
        self.run(&self.root, &["clone", project.git_url.as_str(), path_arg.as_str()])
            .await
            .map(|_| ())
    }

    async fn update(&self, project: &ProjectSettings) -> Result<(), SourceError> {
        self.ensure_cloned(project).await?;
        tracing::trace!(project = %project.name, "Pulling project");
        self.run(&self.project_path(&project.name), &["pull", "--tags"])
            .await
            .map(|_| ())
    }

    async fn refresh_projects(&self, names: &[String]) -> Result<(), SourceError> {
        tokio::fs::create_dir_all(&self.root).await?;
        let projects = self.projects.iter().filter(|p| names.contains(&p.name));
        try_join_all(projects.map(|p| self.update(p))).await?;
        Ok(())
    }

    async fn project_tags(&self, name: &str) -> Result<TagTimeline, SourceError> {
        let stdout = self
            .run(&self.project_path(name), &["tag", "--sort=v:refname"])
            .await?;
        Ok(parse_release_tags(&stdout))
    }

    async fn all_tags(&self, names: &[String]) -> Result<HashMap<String, TagTimeline>, SourceError> {
        let timelines = try_join_all(names.iter().map(|name| async move {
            let tags = self.project_tags(name).await?;
            Ok::<_, SourceError>((name.clone(), tags))
        }))
        .await?;
        Ok(timelines.into_iter().collect())
    }

    async fn project_tickets(&self, project: &str, from: &str, to: &str) -> Result<Vec<String>, SourceError> {
        if from == to {
            return Ok(Vec::new());
        }
        let range = format!("release/{}...release/{}", from, to);
        let stdout = self
            .run(
                &self.project_path(project),
                &[
                    "--no-pager",
                    "log",
                    "--date-order",
                    "--grep=Merge",
                    "--invert-grep",
                    "--pretty=format:%s",
                    range.as_str(),
                ],
            )
            .await?;
        Ok(extract_ticket_keys(&stdout))
    }

    async fn mine_pair(&self, pair: &ManifestPair) -> Result<ManifestTickets, SourceError> {
        let mut tickets: BTreeSet<String> = BTreeSet::new();
        for project in &self.projects {
            let (Some(from), Some(to)) = (
                pair.previous.version_of(&project.name),
                pair.current.version_of(&project.name),
            ) else {
                continue;
            };
            tickets.extend(self.project_tickets(&project.name, from, to).await?);
        }

        tracing::debug!(
            manifest = %pair.current.name,
            tickets = tickets.len(),
            "Mined tickets for manifest"
        );
        Ok(ManifestTickets {
            manifest_name: pair.current.name.clone(),
            tickets,
        })
    }

    async fn mine_pairs(&self, pairs: Vec<ManifestPair>) -> Result<Vec<ManifestTickets>, SourceError> {
        try_join_all(pairs.iter().map(|pair| self.mine_pair(pair))).await
    }
}

impl TagSource for GitRepositories {
    fn refresh<'a>(&'a self, projects: &'a [String]) -> BoxFuture<'a, Result<(), SourceError>> {
        Box::pin(self.refresh_projects(projects))
    }

    fn tags<'a>(
        &'a self,
        projects: &'a [String],
    ) -> BoxFuture<'a, Result<HashMap<String, TagTimeline>, SourceError>> {
        Box::pin(self.all_tags(projects))
    }
}

impl TicketMiner for GitRepositories {
    fn mine(&self, pairs: Vec<ManifestPair>) -> BoxFuture<'_, Result<Vec<ManifestTickets>, SourceError>> {
        Box::pin(self.mine_pairs(pairs))
    }
}

/// Versions of `release/*` tags, in the order git listed them.
fn parse_release_tags(stdout: &str) -> TagTimeline {
    stdout
        .lines()
        .filter_map(|line| RELEASE_TAG.captures(line))
        .map(|caps| caps[1].to_string())
        .collect()
}

/// First ticket key of every commit subject line.
fn extract_ticket_keys(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .filter_map(|line| COMMIT_TICKET.find(line))
        .map(|m| m.as_str().to_string())
        .collect()
}
