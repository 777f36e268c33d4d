//! In-memory collaborators for integration tests.
//!
//! The fixture models three releases of two projects:
//!
//! | manifest | web | api |
//! |----------|-----|-----|
//! | M1       | 1.0 | 2.0 |
//! | M2       | 1.2 | 2.0 |
//! | M3       | 1.3 | 2.1 |

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::BoxFuture;
use release_panel::config::{AppConfig, ProjectSettings};
use release_panel::db::Database;
use release_panel::engine::{Collaborators, ReleaseEngine};
use release_panel::error::SourceError;
use release_panel::models::*;
use release_panel::sources::{IssueTracker, ManifestSource, ProductionMonitor, TagSource, TicketMiner};

// ============================================================
// Fixture data
// ============================================================

pub fn manifest(name: &str, versions: &[(&str, &str)]) -> Manifest {
    Manifest::new(
        name,
        versions
            .iter()
            .map(|(project, version)| ProjectVersion::new(*project, *version))
            .collect(),
    )
}

pub fn fixture_manifests() -> Vec<Manifest> {
    vec![
        manifest("M1", &[("web", "1.0"), ("api", "2.0")]),
        manifest("M2", &[("web", "1.2"), ("api", "2.0")]),
        manifest("M3", &[("web", "1.3"), ("api", "2.1")]),
    ]
}

pub fn fixture_timelines() -> HashMap<String, TagTimeline> {
    HashMap::from([
        ("web".to_string(), strings(&["1.0", "1.1", "1.2", "1.3"])),
        ("api".to_string(), strings(&["2.0", "2.1"])),
    ])
}

/// Keys mined from git, by the manifest that introduced them.
pub fn fixture_mined() -> HashMap<String, Vec<String>> {
    HashMap::from([
        ("M2".to_string(), strings(&["WEB-1", "WEB-2"])),
        ("M3".to_string(), strings(&["API-7", "GHOST-1"])),
    ])
}

pub fn ticket(key: &str, epic: Option<&str>, git_tags: &[&str]) -> Ticket {
    Ticket {
        key: key.to_string(),
        epic_key: epic.map(str::to_string),
        git_tags: strings(git_tags),
        summary: format!("Summary of {}", key),
        status: "Done".to_string(),
        author: "dev".to_string(),
        updated: "2024-01-01T00:00:00.000+0000".to_string(),
        url: format!("https://tracker.test/browse/{}", key),
    }
}

/// Everything the tracker knows about. GHOST-1 is mined but unknown.
pub fn fixture_tickets() -> Vec<Ticket> {
    vec![
        ticket("WEB-0", None, &["web-1.0"]),
        ticket("WEB-1", Some("EPIC-1"), &[]),
        ticket("WEB-2", None, &[]),
        ticket("WEB-3", Some("EPIC-1"), &["web-1.1"]),
        ticket("API-7", Some("EPIC-2"), &[]),
        ticket("EPIC-1", None, &[]),
        ticket("EPIC-2", None, &[]),
    ]
}

pub fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

pub fn test_config() -> AppConfig {
    AppConfig {
        jira_url: Some("https://tracker.test/".to_string()),
        jira_user: Some("bot".to_string()),
        jira_password: Some("secret".to_string()),
        team_name: Some("Rockets".to_string()),
        manifest_index_url: Some("https://manifests.test/index".to_string()),
        manifest_url_format: Some("https://manifests.test/{manifestName}".to_string()),
        prod_url: Some("https://prod.test/versions".to_string()),
        git_repositories_path: Some("/tmp/repos".into()),
        projects: vec![
            ProjectSettings {
                name: "web".to_string(),
                git_url: "git@example.test:web.git".to_string(),
            },
            ProjectSettings {
                name: "api".to_string(),
                git_url: "git@example.test:api.git".to_string(),
            },
        ],
        fetch_timeout: Duration::from_secs(5),
        page_size: 2,
        ..AppConfig::default()
    }
}

// ============================================================
// Fakes
// ============================================================

pub struct FakeManifests {
    pub manifests: Vec<Manifest>,
}

impl ManifestSource for FakeManifests {
    fn list_names(&self) -> BoxFuture<'_, Result<Vec<String>, SourceError>> {
        let names = self.manifests.iter().map(|m| m.name.clone()).collect();
        Box::pin(async move { Ok(names) })
    }

    fn fetch<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<Manifest, SourceError>> {
        Box::pin(async move {
            self.manifests
                .iter()
                .find(|m| m.name == name)
                .cloned()
                .ok_or_else(|| SourceError::Status {
                    status: 404,
                    body: format!("no manifest {}", name),
                })
        })
    }
}

#[derive(Default)]
pub struct FakeTags {
    pub timelines: HashMap<String, TagTimeline>,
    pub refreshes: AtomicUsize,
}

impl TagSource for FakeTags {
    fn refresh<'a>(&'a self, _projects: &'a [String]) -> BoxFuture<'a, Result<(), SourceError>> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        Box::pin(async { Ok(()) })
    }

    fn tags<'a>(
        &'a self,
        projects: &'a [String],
    ) -> BoxFuture<'a, Result<HashMap<String, TagTimeline>, SourceError>> {
        Box::pin(async move {
            Ok(projects
                .iter()
                .filter_map(|p| Some((p.clone(), self.timelines.get(p)?.clone())))
                .collect())
        })
    }
}

/// Returns fixed keys per current manifest and counts how often it mines.
#[derive(Default)]
pub struct FakeMiner {
    pub keys: HashMap<String, Vec<String>>,
    pub calls: AtomicUsize,
    pub mined: Mutex<Vec<String>>,
}

impl TicketMiner for FakeMiner {
    fn mine(&self, pairs: Vec<ManifestPair>) -> BoxFuture<'_, Result<Vec<ManifestTickets>, SourceError>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            // Let concurrent callers pile up on the cache lock.
            tokio::time::sleep(Duration::from_millis(20)).await;
            let mut mined = self.mined.lock().unwrap();
            Ok(pairs
                .iter()
                .map(|pair| {
                    mined.push(pair.current.name.clone());
                    let keys = self.keys.get(&pair.current.name).cloned().unwrap_or_default();
                    ManifestTickets::new(pair.current.name.clone(), keys)
                })
                .collect())
        })
    }
}

/// Matches queries against an in-memory ticket list and pages the result.
#[derive(Default)]
pub struct FakeTracker {
    pub tickets: Vec<Ticket>,
    /// Fail any page starting at or after this offset.
    pub fail_from: Option<usize>,
    pub searches: Mutex<Vec<(TicketQuery, usize)>>,
    pub filters: Mutex<Vec<(String, TicketQuery)>>,
}

impl FakeTracker {
    fn matches(query: &TicketQuery, ticket: &Ticket) -> bool {
        match query {
            TicketQuery::Stories {
                projects_tags,
                keys,
            } => {
                keys.contains(&ticket.key)
                    || projects_tags.iter().any(|pt| {
                        pt.tags.iter().any(|tag| {
                            ticket
                                .git_tags
                                .contains(&format!("{}-{}", pt.project_name, tag))
                        })
                    })
            }
            TicketQuery::EpicStories { epic_key } => ticket.epic_key.as_deref() == Some(epic_key.as_str()),
        }
    }
}

impl IssueTracker for FakeTracker {
    fn search<'a>(
        &'a self,
        query: &'a TicketQuery,
        start_at: usize,
        page_size: usize,
    ) -> BoxFuture<'a, Result<TicketPage, SourceError>> {
        Box::pin(async move {
            self.searches.lock().unwrap().push((query.clone(), start_at));
            if self.fail_from.is_some_and(|from| start_at >= from) {
                return Err(SourceError::Status {
                    status: 503,
                    body: "tracker unavailable".to_string(),
                });
            }
            let matching: Vec<Ticket> = self
                .tickets
                .iter()
                .filter(|t| Self::matches(query, t))
                .cloned()
                .collect();
            Ok(TicketPage {
                total: matching.len(),
                tickets: matching.into_iter().skip(start_at).take(page_size).collect(),
            })
        })
    }

    fn unknown_keys<'a>(&'a self, keys: &'a [String]) -> BoxFuture<'a, Result<Vec<String>, SourceError>> {
        Box::pin(async move {
            Ok(keys
                .iter()
                .filter(|k| !self.tickets.iter().any(|t| &t.key == *k))
                .cloned()
                .collect())
        })
    }

    fn create_filter<'a>(
        &'a self,
        name: &'a str,
        query: &'a TicketQuery,
    ) -> BoxFuture<'a, Result<String, SourceError>> {
        Box::pin(async move {
            let mut filters = self.filters.lock().unwrap();
            filters.push((name.to_string(), query.clone()));
            Ok(format!("https://tracker.test/issues/?filter={}", filters.len()))
        })
    }
}

pub struct FakeProduction {
    pub versions: Vec<ProjectVersion>,
}

impl ProductionMonitor for FakeProduction {
    fn production_versions(&self) -> BoxFuture<'_, Result<Vec<ProjectVersion>, SourceError>> {
        let versions = self.versions.clone();
        Box::pin(async move { Ok(versions) })
    }
}

// ============================================================
// Harness
// ============================================================

/// An engine wired to the fixture fakes, with handles to inspect them.
pub struct Harness {
    pub engine: ReleaseEngine,
    pub db: Database,
    pub tags: Arc<FakeTags>,
    pub miner: Arc<FakeMiner>,
    pub tracker: Arc<FakeTracker>,
}

impl Harness {
    pub fn new() -> Self {
        Self::build(test_config(), FakeTracker {
            tickets: fixture_tickets(),
            ..FakeTracker::default()
        })
    }

    pub fn with_config(config: AppConfig) -> Self {
        Self::build(config, FakeTracker {
            tickets: fixture_tickets(),
            ..FakeTracker::default()
        })
    }

    pub fn with_tracker(tracker: FakeTracker) -> Self {
        Self::build(test_config(), tracker)
    }

    fn build(config: AppConfig, tracker: FakeTracker) -> Self {
        let db = Database::open_memory().expect("Failed to create in-memory database");
        db.migrate().expect("Failed to run migrations");

        let tags = Arc::new(FakeTags {
            timelines: fixture_timelines(),
            ..FakeTags::default()
        });
        let miner = Arc::new(FakeMiner {
            keys: fixture_mined(),
            ..FakeMiner::default()
        });
        let tracker = Arc::new(tracker);

        let collaborators = Collaborators {
            manifests: Arc::new(FakeManifests {
                manifests: fixture_manifests(),
            }),
            tags: tags.clone(),
            miner: miner.clone(),
            tracker: tracker.clone(),
            production: Arc::new(FakeProduction {
                versions: vec![ProjectVersion::new("web", "1.0"), ProjectVersion::new("api", "2.0")],
            }),
            cache: Arc::new(db.clone()),
        };

        Self {
            engine: ReleaseEngine::new(config, collaborators),
            db,
            tags,
            miner,
            tracker,
        }
    }
}

pub fn keys(tickets: &[Ticket]) -> Vec<&str> {
    tickets.iter().map(|t| t.key.as_str()).collect()
}
