//! Speed test server descriptor

use crate::types::{AppError, Result};
use serde::{Deserialize, Serialize};

/// A resolved speed test server
///
/// Supplied by whoever picks the server; the engine only reads it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerEndpoint {
    pub id: String,
    pub name: String,
    pub download_url: String,
    pub upload_url: String,
    pub trace_url: String,
}

impl ServerEndpoint {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        download_url: impl Into<String>,
        upload_url: impl Into<String>,
        trace_url: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            download_url: download_url.into(),
            upload_url: upload_url.into(),
            trace_url: trace_url.into(),
        }
    }

    /// Build an endpoint whose three URLs hang off one base URL
    ///
    /// Paths follow the Cloudflare layout: `__down`, `__up`, `cdn-cgi/trace`.
    pub fn from_base(id: impl Into<String>, base: &str, download_bytes: u64) -> Result<Self> {
        let base = url::Url::parse(base)?;
        let id = id.into();

        let mut download = base.join("__down")?;
        download
            .query_pairs_mut()
            .append_pair("bytes", &download_bytes.to_string());
        let upload = base.join("__up")?;
        let trace = base.join("cdn-cgi/trace")?;

        Ok(Self {
            name: id.clone(),
            id,
            download_url: download.to_string(),
            upload_url: upload.to_string(),
            trace_url: trace.to_string(),
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(AppError::validation("Server id cannot be empty"));
        }

        for (label, value) in [
            ("download", &self.download_url),
            ("upload", &self.upload_url),
            ("trace", &self.trace_url),
        ] {
            let parsed = url::Url::parse(value).map_err(|e| {
                AppError::validation(format!("Invalid {} URL '{}': {}", label, value, e))
            })?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(AppError::validation(format!(
                    "{} URL must use http or https: {}",
                    label, value
                )));
            }
        }

        Ok(())
    }
}
