//! Manifests served by the artifact repository.
//!
//! The index is an XML listing of `<version>` elements, oldest first. Each
//! manifest document is JSON with an `applications` array. Downloaded manifests
//! are persisted and read back from the database on later requests.

use std::sync::LazyLock;

use futures::future::BoxFuture;
use regex::Regex;
use reqwest::Client;
use serde_json::Value;

use super::ManifestSource;
use crate::db::Database;
use crate::error::SourceError;
use crate::models::{Manifest, ProjectVersion};

static INDEX_VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<version>(.*?)</version>").expect("valid index regex"));

const NAME_PLACEHOLDER: &str = "{manifestName}";

#[derive(Clone)]
pub struct HttpManifestSource {
    index_url: String,
    url_format: String,
    db: Database,
    client: Client,
}

impl HttpManifestSource {
    pub fn new(index_url: impl Into<String>, url_format: impl Into<String>, db: Database) -> Self {
        Self {
            index_url: index_url.into(),
            url_format: url_format.into(),
            db,
            client: Client::new(),
        }
    }

    async fn get_text(&self, url: &str) -> Result<String, SourceError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(SourceError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }

    async fn load_names(&self) -> Result<Vec<String>, SourceError> {
        tracing::trace!(url = %self.index_url, "Loading manifest index");
        let body = self.get_text(&self.index_url).await?;
        Ok(parse_index(&body))
    }

    async fn load_manifest(&self, name: &str) -> Result<Manifest, SourceError> {
        if let Some(existing) = self.db.find_manifest(name).map_err(cache_error)? {
            tracing::trace!(manifest = name, "Manifest found in the database");
            return Ok(existing);
        }

        let url = self.url_format.replace(NAME_PLACEHOLDER, name);
        tracing::debug!(manifest = name, %url, "Downloading manifest");
        let body = self.get_text(&url).await?;
        let document: Value = serde_json::from_str(&body)?;
        let manifest = parse_manifest(name, &document);

        self.db.insert_manifest(&manifest).map_err(cache_error)?;
        Ok(manifest)
    }
}

impl ManifestSource for HttpManifestSource {
    fn list_names(&self) -> BoxFuture<'_, Result<Vec<String>, SourceError>> {
        Box::pin(self.load_names())
    }

    fn fetch<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<Manifest, SourceError>> {
        Box::pin(self.load_manifest(name))
    }
}

fn cache_error(e: anyhow::Error) -> SourceError {
    SourceError::Store(format!("{:#}", e))
}

fn parse_index(body: &str) -> Vec<String> {
    INDEX_VERSION
        .captures_iter(body)
        .map(|caps| caps[1].to_string())
        .collect()
}

/// A document without an `applications` array yields an invalid manifest.
fn parse_manifest(name: &str, document: &Value) -> Manifest {
    let Some(applications) = document["applications"].as_array() else {
        tracing::error!(manifest = name, "Manifest doesn't have any applications");
        return Manifest::invalid(name);
    };

    let project_versions = applications
        .iter()
        .filter_map(|app| {
            Some(ProjectVersion::new(
                app["application_name"].as_str()?,
                app["version"].as_str()?,
            ))
        })
        .collect();

    Manifest::new(name, project_versions)
}
