use serde::{Deserialize, Serialize};

use super::ProjectTags;

/// An issue-tracker record.
///
/// `git_tags` is the tracker's own record of which `"{project}-{tag}"` labels
/// reference the ticket. `epic_key` is a back-reference, not ownership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    pub key: String,
    pub epic_key: Option<String>,
    #[serde(default)]
    pub git_tags: Vec<String>,
    pub summary: String,
    pub status: String,
    pub author: String,
    /// Last update timestamp as reported by the tracker.
    pub updated: String,
    pub url: String,
}

/// One page of tracker search results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketPage {
    /// Grand total of records matching the query, across all pages.
    pub total: usize,
    pub tickets: Vec<Ticket>,
}

/// Which tickets to search for. Tracker clients render this into their own
/// query language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TicketQuery {
    /// Tickets labelled with any of the project tags, or with any of the keys.
    Stories {
        projects_tags: Vec<ProjectTags>,
        keys: Vec<String>,
    },
    /// Stories linked to one epic.
    EpicStories { epic_key: String },
}

impl TicketQuery {
    pub fn keys(keys: Vec<String>) -> Self {
        Self::Stories {
            projects_tags: Vec::new(),
            keys,
        }
    }

    /// True when the query cannot match anything and need not be sent.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Stories {
                projects_tags,
                keys,
            } => keys.is_empty() && projects_tags.iter().all(|pt| pt.tags.is_empty()),
            Self::EpicStories { epic_key } => epic_key.is_empty(),
        }
    }
}
