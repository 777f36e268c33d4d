//! Resolves an inclusive, named range of manifests into its tags and tickets.

use std::collections::{HashMap, HashSet};

use crate::error::EngineError;
use crate::models::{Manifest, ManifestTagWindow, ManifestTickets, ProjectTags, ReleaseRange};

/// Locate the manifests from `start` to `end`, both inclusive.
///
/// Collection begins at the first manifest named `start` and ends at the first
/// later manifest named `end`. When `start == end` the range is that single
/// manifest.
pub fn select_range<'a>(
    manifests: &'a [Manifest],
    start: &str,
    end: &str,
) -> Result<&'a [Manifest], EngineError> {
    let first = manifests
        .iter()
        .position(|m| m.name == start)
        .ok_or_else(|| EngineError::RangeNotFound {
            start: start.to_string(),
        })?;

    let last = manifests[first..]
        .iter()
        .position(|m| m.name == end)
        .map(|offset| first + offset)
        .ok_or_else(|| EngineError::RangeUnterminated {
            start: start.to_string(),
            end: end.to_string(),
        })?;

    Ok(&manifests[first..=last])
}

/// Resolve the range and aggregate its tags and tickets.
///
/// Tags are unioned per project, keeping first-seen project order and tag
/// order. Ticket keys are unioned across the collected manifests.
pub fn resolve_range(
    manifests: &[Manifest],
    windows: &[ManifestTagWindow],
    tickets: &[ManifestTickets],
    start: &str,
    end: &str,
) -> Result<ReleaseRange, EngineError> {
    let selected = select_range(manifests, start, end)?;
    let names: HashSet<&str> = selected.iter().map(|m| m.name.as_str()).collect();

    let mut projects_tags: Vec<ProjectTags> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for window in windows
        .iter()
        .filter(|w| names.contains(w.manifest_name.as_str()))
    {
        for project in &window.projects_tags {
            let slot = *index
                .entry(project.project_name.clone())
                .or_insert_with(|| {
                    projects_tags.push(ProjectTags {
                        project_name: project.project_name.clone(),
                        tags: Vec::new(),
                    });
                    projects_tags.len() - 1
                });
            let tags = &mut projects_tags[slot].tags;
            for tag in &project.tags {
                if !tags.contains(tag) {
                    tags.push(tag.clone());
                }
            }
        }
    }

    let mut seen: HashSet<&str> = HashSet::new();
    let mut keys: Vec<String> = Vec::new();
    for key in tickets
        .iter()
        .filter(|mt| names.contains(mt.manifest_name.as_str()))
        .flat_map(|mt| mt.tickets.iter())
    {
        if seen.insert(key.as_str()) {
            keys.push(key.clone());
        }
    }

    tracing::debug!(
        start,
        end,
        manifests = selected.len(),
        tickets = keys.len(),
        "Resolved release range"
    );

    Ok(ReleaseRange {
        manifests: selected.iter().map(|m| m.name.clone()).collect(),
        projects_tags,
        tickets: keys,
    })
}
