pub mod submission_source;
