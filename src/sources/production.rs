//! Versions currently running in production, as reported by the monitor.

use futures::future::BoxFuture;
use reqwest::Client;
use serde::Deserialize;

use super::ProductionMonitor;
use crate::error::SourceError;
use crate::models::ProjectVersion;

#[derive(Debug, Deserialize)]
struct DeployedApplication {
    #[serde(rename = "an")]
    application: String,
    #[serde(rename = "ver")]
    version: String,
}

#[derive(Debug, Clone)]
pub struct ProductionMonitorClient {
    url: String,
    projects: Vec<String>,
    client: Client,
}

impl ProductionMonitorClient {
    /// Only applications named in `projects` are reported.
    pub fn new(url: impl Into<String>, projects: Vec<String>) -> Self {
        Self {
            url: url.into(),
            projects,
            client: Client::new(),
        }
    }

    async fn load(&self) -> Result<Vec<ProjectVersion>, SourceError> {
        tracing::trace!(url = %self.url, "Loading production versions");
        let response = self.client.get(&self.url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let deployed: Vec<DeployedApplication> = response.json().await?;
        Ok(filter_projects(deployed, &self.projects))
    }
}

impl ProductionMonitor for ProductionMonitorClient {
    fn production_versions(&self) -> BoxFuture<'_, Result<Vec<ProjectVersion>, SourceError>> {
        Box::pin(self.load())
    }
}

fn filter_projects(deployed: Vec<DeployedApplication>, projects: &[String]) -> Vec<ProjectVersion> {
    deployed
        .into_iter()
        .filter(|app| projects.contains(&app.application))
        .map(|app| ProjectVersion::new(app.application, app.version))
        .collect()
}
