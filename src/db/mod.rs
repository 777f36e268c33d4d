mod schema;

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params_from_iter, Connection, OptionalExtension};

use crate::engine::TicketCache;
use crate::models::*;

/// SQLite store for downloaded manifests and mined manifest tickets.
///
/// Both tables are append-only: rows are inserted once and never updated.
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn open(path: PathBuf) -> Result<Self> {
        let parent = path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("Database path has no parent directory"))?;
        std::fs::create_dir_all(parent)?;
        let conn = Connection::open(&path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_default() -> Result<Self> {
        let dirs = directories::ProjectDirs::from("", "", "release-panel")
            .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
        let db_path = dirs.data_dir().join("release-panel.db");
        Self::open(db_path)
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock().expect("database lock poisoned");
        schema::run_migrations(&conn)
    }

    // ============================================================
    // Manifest operations
    // ============================================================

    pub fn find_manifest(&self, name: &str) -> Result<Option<Manifest>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let row = conn
            .query_row(
                "SELECT name, is_valid, project_versions FROM manifests WHERE name = ?",
                [name],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i32>(1)? != 0,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?;

        row.map(|(name, is_valid, versions)| -> Result<Manifest> {
            let project_versions = serde_json::from_str(&versions)
                .with_context(|| format!("Corrupt project versions for manifest '{}'", name))?;
            Ok(Manifest {
                name,
                project_versions,
                is_valid,
            })
        })
        .transpose()
    }

    /// Store a manifest. Returns false if it was already stored.
    pub fn insert_manifest(&self, manifest: &Manifest) -> Result<bool> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let versions = serde_json::to_string(&manifest.project_versions)?;
        let rows = conn.execute(
            "INSERT OR IGNORE INTO manifests (name, is_valid, project_versions, created_at)
             VALUES (?, ?, ?, ?)",
            (
                &manifest.name,
                if manifest.is_valid { 1 } else { 0 },
                &versions,
                Utc::now().to_rfc3339(),
            ),
        )?;
        Ok(rows > 0)
    }

    // ============================================================
    // Manifest ticket operations
    // ============================================================

    pub fn get_manifest_tickets(&self, names: &[String]) -> Result<Vec<ManifestTickets>> {
        if names.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.conn.lock().expect("database lock poisoned");
        let placeholders = vec!["?"; names.len()].join(", ");
        let mut stmt = conn.prepare(&format!(
            "SELECT manifest_name, tickets FROM manifest_tickets WHERE manifest_name IN ({})",
            placeholders
        ))?;

        let rows = stmt
            .query_map(params_from_iter(names.iter()), |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(manifest_name, tickets)| -> Result<ManifestTickets> {
                let tickets = serde_json::from_str(&tickets).with_context(|| {
                    format!("Corrupt ticket list for manifest '{}'", manifest_name)
                })?;
                Ok(ManifestTickets {
                    manifest_name,
                    tickets,
                })
            })
            .collect()
    }

    /// Store mined tickets. Returns false if the manifest already had a record,
    /// which happens when two requests mine the same manifest.
    pub fn insert_manifest_tickets(&self, tickets: &ManifestTickets) -> Result<bool> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let keys = serde_json::to_string(&tickets.tickets)?;
        let rows = conn.execute(
            "INSERT OR IGNORE INTO manifest_tickets (manifest_name, tickets, created_at)
             VALUES (?, ?, ?)",
            (&tickets.manifest_name, &keys, Utc::now().to_rfc3339()),
        )?;
        Ok(rows > 0)
    }
}

impl TicketCache for Database {
    fn cached(&self, manifest_names: &[String]) -> Result<Vec<ManifestTickets>> {
        self.get_manifest_tickets(manifest_names)
    }

    fn store(&self, tickets: &ManifestTickets) -> Result<()> {
        if !self.insert_manifest_tickets(tickets)? {
            tracing::debug!(
                manifest = %tickets.manifest_name,
                "Manifest tickets already cached, keeping existing record"
            );
        }
        Ok(())
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
        }
    }
}
