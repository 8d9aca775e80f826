//! Providers of raw submission rows.
//!
//! The engine never reaches out for data itself; callers hand it a
//! [`SubmissionSource`] chosen from the command line.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::info;

use crate::analyzers::types::SubmissionRecord;
use crate::fetch::auth::ApiKey;
use crate::fetch::{BasicClient, HttpClient, fetch_bytes};
use crate::parser::parse_submissions;

/// Environment variable holding an optional bearer token for HTTP sources.
pub const API_TOKEN_VAR: &str = "CLASSROOM_API_TOKEN";

/// Abstraction over wherever submission exports come from.
#[async_trait]
pub trait SubmissionSource: Send + Sync {
    /// Returns every submission in the snapshot, in source order.
    async fn fetch_submissions(&self) -> Result<Vec<SubmissionRecord>>;

    /// Short description for logs.
    fn describe(&self) -> String;
}

/// Reads a CSV export (optionally gzipped) from disk.
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SubmissionSource for FileSource {
    async fn fetch_submissions(&self) -> Result<Vec<SubmissionRecord>> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .with_context(|| format!("failed to read {}", self.path.display()))?;
        parse_submissions(&bytes)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Downloads a CSV export over HTTP.
pub struct HttpSource<C> {
    client: C,
    url: String,
}

impl<C: HttpClient> HttpSource<C> {
    pub fn new(client: C, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl<C: HttpClient> SubmissionSource for HttpSource<C> {
    async fn fetch_submissions(&self) -> Result<Vec<SubmissionRecord>> {
        let bytes = fetch_bytes(&self.client, &self.url)
            .await
            .with_context(|| format!("failed to fetch {}", self.url))?;
        parse_submissions(&bytes)
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

/// Picks a source for `location`: URLs go over HTTP (with a bearer token when
/// one is given), anything else is a local path.
pub fn open_source(location: &str, token: Option<&str>) -> Result<Box<dyn SubmissionSource>> {
    if location.starts_with("http://") || location.starts_with("https://") {
        let client: Box<dyn HttpClient> = match token {
            Some(token) => {
                info!("Using bearer token for HTTP source");
                Box::new(ApiKey::bearer(BasicClient::new()?, token)?)
            }
            None => Box::new(BasicClient::new()?),
        };
        Ok(Box::new(HttpSource::new(client, location)))
    } else {
        Ok(Box::new(FileSource::new(location)))
    }
}
