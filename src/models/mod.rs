//! Domain models for the release panel.
//!
//! # Core Concepts
//!
//! ## Release history
//!
//! - [`Manifest`]: Immutable, named snapshot of deployed project versions. A manifest
//!   doubles as the identity of a release.
//! - [`ManifestTagWindow`]: Tags each manifest newly introduced, per project.
//! - [`ManifestTickets`]: Ticket keys mined from git history between a manifest and
//!   its predecessor. Cached forever once mined.
//!
//! ## Tracker records
//!
//! - [`Ticket`]: An issue-tracker record, including the git tag labels the tracker
//!   itself associates with it.
//! - [`TicketQuery`]: A tracker-agnostic description of which tickets to search for.
//!
//! ## Reports
//!
//! These are built fresh for every request and never persisted:
//!
//! - [`Release`]: A manifest with its correlated, deduplicated tickets.
//! - [`ReleaseRange`]: Tags and tickets spanning a named range of manifests.
//! - [`UpcomingReleasesReport`]: Everything the upcoming releases view needs.

mod manifest;
mod release;
mod ticket;

pub use manifest::*;
pub use release::*;
pub use ticket::*;
