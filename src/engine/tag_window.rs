//! Slices each project's tag timeline into the window consumed by each manifest.
//!
//! Every project keeps a cursor into its own timeline. The cursor starts at the
//! first manifest's own tag, so tags older than the first tracked release are
//! never emitted. For each manifest the window is `timeline[cursor..end)` where
//! `end` is one past the manifest's version, and the cursor then moves to `end`.
//!
//! When a version is missing from the timeline, or sits before the cursor (a
//! tag was moved or history was rewritten), the window degrades to the literal
//! version and the cursor stays put. The next manifest then picks up every tag
//! the degraded one skipped.

use std::collections::HashMap;

use crate::models::{Manifest, ManifestTagWindow, ProjectTags, TagTimeline};

/// Resolve the tag window of every manifest, oldest first.
///
/// Projects with no entry in `timelines` are skipped for all manifests. The
/// projects inside each window keep the manifest's own project order.
pub fn resolve(
    manifests: &[Manifest],
    timelines: &HashMap<String, TagTimeline>,
) -> Vec<ManifestTagWindow> {
    let Some(first) = manifests.first() else {
        return Vec::new();
    };

    // Per project, one window per manifest that lists the project.
    let mut per_project: HashMap<&str, std::vec::IntoIter<Vec<String>>> = timelines
        .iter()
        .map(|(project, timeline)| {
            let windows = project_windows(project, timeline, first, manifests);
            (project.as_str(), windows.into_iter())
        })
        .collect();

    manifests
        .iter()
        .map(|manifest| {
            let projects_tags = manifest
                .project_versions
                .iter()
                .filter_map(|pv| {
                    let tags = per_project.get_mut(pv.name.as_str())?.next()?;
                    Some(ProjectTags {
                        project_name: pv.name.clone(),
                        tags,
                    })
                })
                .collect();
            ManifestTagWindow {
                manifest_name: manifest.name.clone(),
                projects_tags,
            }
        })
        .collect()
}

/// Fold one project's cursor over the manifests that list it.
fn project_windows(
    project: &str,
    timeline: &TagTimeline,
    first: &Manifest,
    manifests: &[Manifest],
) -> Vec<Vec<String>> {
    let start = initial_cursor(project, timeline, first);

    manifests
        .iter()
        .flat_map(|manifest| {
            manifest
                .project_versions
                .iter()
                .filter(|pv| pv.name == project)
                .map(|pv| pv.version.as_str())
        })
        .scan(start, |cursor, version| {
            Some(match window(timeline, *cursor, version) {
                Some((tags, end)) => {
                    *cursor = end;
                    tags
                }
                None => {
                    tracing::debug!(
                        project,
                        version,
                        cursor = *cursor,
                        "Version not found after cursor, using degraded tag window"
                    );
                    vec![version.to_string()]
                }
            })
        })
        .collect()
}

/// The cursor points at the first manifest's own tag. Projects absent from the
/// first manifest, or whose version is not tagged, start at the beginning.
fn initial_cursor(project: &str, timeline: &TagTimeline, first: &Manifest) -> usize {
    first
        .version_of(project)
        .and_then(|version| position(timeline, version))
        .unwrap_or(0)
}

/// The window ending at `version`, and the new cursor.
fn window(timeline: &TagTimeline, cursor: usize, version: &str) -> Option<(Vec<String>, usize)> {
    let end = position(timeline, version)? + 1;
    if end < cursor {
        return None;
    }
    Some((timeline[cursor..end].to_vec(), end))
}

fn position(timeline: &TagTimeline, version: &str) -> Option<usize> {
    timeline.iter().position(|tag| tag == version)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProjectVersion;

    fn manifest(name: &str, versions: &[(&str, &str)]) -> Manifest {
        Manifest::new(
            name,
            versions
                .iter()
                .map(|(p, v)| ProjectVersion::new(*p, *v))
                .collect(),
        )
    }

    fn timelines(entries: &[(&str, Vec<&str>)]) -> HashMap<String, TagTimeline> {
        entries
            .iter()
            .map(|(p, tags)| (p.to_string(), tags.iter().map(|t| t.to_string()).collect()))
            .collect()
    }

    fn tags(windows: &[ManifestTagWindow], manifest: usize, project: &str) -> Vec<String> {
        windows[manifest]
            .tags_for(project)
            .expect("project window")
            .to_vec()
    }

    #[test]
    fn one_tag_per_manifest_when_releases_are_consecutive() {
        let manifests = vec![
            manifest("M1", &[("web", "1.0")]),
            manifest("M2", &[("web", "1.1")]),
            manifest("M3", &[("web", "1.2")]),
        ];
        let timelines = timelines(&[("web", vec!["1.0", "1.1", "1.2", "1.3"])]);

        let windows = resolve(&manifests, &timelines);

        assert_eq!(windows.len(), 3);
        assert_eq!(tags(&windows, 0, "web"), vec!["1.0"]);
        assert_eq!(tags(&windows, 1, "web"), vec!["1.1"]);
        assert_eq!(tags(&windows, 2, "web"), vec!["1.2"]);
    }

    #[test]
    fn first_window_does_not_include_older_tags() {
        let manifests = vec![
            manifest("M1", &[("web", "1.2")]),
            manifest("M2", &[("web", "1.5")]),
        ];
        let timelines = timelines(&[("web", vec!["1.0", "1.1", "1.2", "1.3", "1.4", "1.5"])]);

        let windows = resolve(&manifests, &timelines);

        assert_eq!(tags(&windows, 0, "web"), vec!["1.2"]);
        assert_eq!(tags(&windows, 1, "web"), vec!["1.3", "1.4", "1.5"]);
    }

    #[test]
    fn unchanged_version_yields_empty_window() {
        let manifests = vec![
            manifest("M1", &[("web", "1.0")]),
            manifest("M2", &[("web", "1.0")]),
        ];
        let timelines = timelines(&[("web", vec!["1.0", "1.1"])]);

        let windows = resolve(&manifests, &timelines);

        assert!(tags(&windows, 1, "web").is_empty());
    }

    #[test]
    fn missing_version_degrades_without_advancing_cursor() {
        let manifests = vec![
            manifest("M1", &[("web", "1.0")]),
            manifest("M2", &[("web", "9.9")]),
            manifest("M3", &[("web", "1.2")]),
        ];
        let timelines = timelines(&[("web", vec!["1.0", "1.1", "1.2"])]);

        let windows = resolve(&manifests, &timelines);

        assert_eq!(tags(&windows, 1, "web"), vec!["9.9"]);
        assert_eq!(tags(&windows, 2, "web"), vec!["1.1", "1.2"]);
    }

    #[test]
    fn version_behind_cursor_degrades() {
        let manifests = vec![
            manifest("M1", &[("web", "1.0")]),
            manifest("M2", &[("web", "1.2")]),
            manifest("M3", &[("web", "1.1")]),
            manifest("M4", &[("web", "1.3")]),
        ];
        let timelines = timelines(&[("web", vec!["1.0", "1.1", "1.2", "1.3"])]);

        let windows = resolve(&manifests, &timelines);

        assert_eq!(tags(&windows, 1, "web"), vec!["1.1", "1.2"]);
        assert_eq!(tags(&windows, 2, "web"), vec!["1.1"]);
        assert_eq!(tags(&windows, 3, "web"), vec!["1.3"]);
    }

    #[test]
    fn projects_without_timeline_are_skipped() {
        let manifests = vec![
            manifest("M1", &[("web", "1.0"), ("legacy", "0.1")]),
            manifest("M2", &[("web", "1.1"), ("legacy", "0.2")]),
        ];
        let timelines = timelines(&[("web", vec!["1.0", "1.1"])]);

        let windows = resolve(&manifests, &timelines);

        assert_eq!(windows[1].projects_tags.len(), 1);
        assert!(windows[1].tags_for("legacy").is_none());
    }

    #[test]
    fn project_joining_later_starts_at_beginning_of_timeline() {
        let manifests = vec![
            manifest("M1", &[("web", "1.0")]),
            manifest("M2", &[("web", "1.1"), ("api", "2.1")]),
        ];
        let timelines = timelines(&[("web", vec!["1.0", "1.1"]), ("api", vec!["2.0", "2.1", "2.2"])]);

        let windows = resolve(&manifests, &timelines);

        assert!(windows[0].tags_for("api").is_none());
        assert_eq!(tags(&windows, 1, "api"), vec!["2.0", "2.1"]);
    }

    #[test]
    fn windows_keep_manifest_project_order() {
        let manifests = vec![manifest("M1", &[("web", "1.0"), ("api", "2.0"), ("cms", "3.0")])];
        let timelines = timelines(&[("cms", vec!["3.0"]), ("web", vec!["1.0"]), ("api", vec!["2.0"])]);

        let windows = resolve(&manifests, &timelines);
        let order: Vec<&str> = windows[0]
            .projects_tags
            .iter()
            .map(|pt| pt.project_name.as_str())
            .collect();

        assert_eq!(order, vec!["web", "api", "cms"]);
    }

    #[test]
    fn windows_partition_a_monotonic_timeline() {
        let timeline: Vec<&str> = vec!["1.0", "1.1", "1.2", "1.3", "1.4", "1.5", "1.6", "1.7"];
        let picks = ["1.1", "1.1", "1.4", "1.5", "1.7"];
        let manifests: Vec<Manifest> = picks
            .iter()
            .enumerate()
            .map(|(i, v)| manifest(&format!("M{}", i), &[("web", *v)]))
            .collect();
        let timelines = timelines(&[("web", timeline)]);

        let windows = resolve(&manifests, &timelines);
        let joined: Vec<String> = (0..windows.len())
            .flat_map(|i| tags(&windows, i, "web"))
            .collect();

        assert_eq!(joined, vec!["1.1", "1.2", "1.3", "1.4", "1.5", "1.6", "1.7"]);
    }

    #[test]
    fn empty_manifest_list_yields_no_windows() {
        let timelines = timelines(&[("web", vec!["1.0"])]);
        assert!(resolve(&[], &timelines).is_empty());
    }
}
