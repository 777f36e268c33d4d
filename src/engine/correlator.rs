//! Merges mined ticket keys and tag cross-references into one ticket list per
//! release.
//!
//! Mined tickets come first, in tracker order. Tickets found through their
//! `"{project}-{tag}"` labels follow, grouped by project in window order. A key
//! is never emitted twice.

use std::collections::HashSet;

use crate::models::{Manifest, ManifestTagWindow, ManifestTickets, Ticket};

/// Correlate the tickets of one release.
///
/// `tracker_tickets` is the full result of the tracker query, in query order.
/// Counts at or above `suspicious_count` are logged as a warning but never
/// rejected.
pub fn correlate(
    manifest: &Manifest,
    mined: Option<&ManifestTickets>,
    window: Option<&ManifestTagWindow>,
    tracker_tickets: &[Ticket],
    suspicious_count: usize,
) -> Vec<Ticket> {
    let mut selected: Vec<Ticket> = Vec::new();
    let mut used: HashSet<&str> = HashSet::new();

    if let Some(mined) = mined {
        for ticket in tracker_tickets {
            if mined.tickets.contains(&ticket.key) && used.insert(ticket.key.as_str()) {
                selected.push(ticket.clone());
            }
        }

        if selected.len() >= suspicious_count {
            tracing::warn!(
                manifest = %manifest.name,
                count = selected.len(),
                threshold = suspicious_count,
                "Suspicious number of mined tickets for manifest"
            );
        }
    }

    if let Some(window) = window {
        for project in &window.projects_tags {
            let expected: HashSet<String> = project
                .tags
                .iter()
                .map(|tag| cross_reference_label(&project.project_name, tag))
                .collect();
            if expected.is_empty() {
                continue;
            }

            for ticket in tracker_tickets {
                if used.contains(ticket.key.as_str()) {
                    continue;
                }
                if ticket.git_tags.iter().any(|label| expected.contains(label)) {
                    used.insert(ticket.key.as_str());
                    selected.push(ticket.clone());
                }
            }
        }
    }

    if selected.len() >= suspicious_count {
        tracing::warn!(
            manifest = %manifest.name,
            count = selected.len(),
            threshold = suspicious_count,
            "Suspicious number of tickets for manifest after adding tag cross-references"
        );
    }

    selected
}

/// The label the tracker uses to link a ticket to a project's git tag.
pub fn cross_reference_label(project: &str, tag: &str) -> String {
    format!("{}-{}", project, tag)
}
