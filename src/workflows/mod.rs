//! Domain workflows of the marketplace backend.
//!
//! Each submodule owns one aggregate of the document store and every
//! cross-document consistency rule that touches it. The job aggregate
//! is the busiest: its lifecycle, signature and selection services all
//! share the [`jobs::JobRepository`] seam.

pub mod alerts;
pub mod companies;
pub mod error_reports;
pub mod jobs;
pub mod notifications;
pub mod tags;
pub mod users;
