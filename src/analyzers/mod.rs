//! Submission classification and per-student aggregation.
//!
//! This module maps each submission to a flag under the selected scoring
//! mode, rolls flags up per student over only the assignments each student
//! was given, and orchestrates the classify and aggregate steps between a
//! [`SubmissionSource`](crate::services::submission_source::SubmissionSource)
//! and a [`TableSink`](crate::output::TableSink).

pub mod aggregate;
pub mod analyzer;
pub mod classify;
pub mod types;
pub mod utility;
