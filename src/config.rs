//! Operating constants and their overrides.
//!
//! Defaults match the deployed capture station; the CLI can override the
//! server location, credential and timing through flags or environment.

use std::time::Duration;

use url::Url;

use crate::error::SmearscopeError;
use crate::viewport::ZoomLimits;

pub const DEFAULT_SERVER: &str = "http://127.0.0.1:8000";
pub const POLL_INTERVAL: Duration = Duration::from_millis(500);
pub const REQUEST_TIMEOUT: Duration = Duration::from_millis(10_000);
pub const FAILURE_THRESHOLD: u32 = 3;
pub const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// Parses the backend root URL given on the command line.
pub fn parse_server(server: &str) -> Result<Url, SmearscopeError> {
    Url::parse(server).map_err(|source| SmearscopeError::InvalidServerUrl {
        url: server.to_string(),
        source,
    })
}

/// Timing and limits for one workstation session.
#[derive(Clone, Debug)]
pub struct Settings {
    /// Cadence of preview fetches.
    pub poll_interval: Duration,
    /// Upper bound for any single backend request.
    pub request_timeout: Duration,
    /// Consecutive preview failures tolerated before the preview trips.
    pub failure_threshold: u32,
    /// Largest accepted upload, in bytes.
    pub max_upload_bytes: usize,
    pub zoom: ZoomLimits,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            poll_interval: POLL_INTERVAL,
            request_timeout: REQUEST_TIMEOUT,
            failure_threshold: FAILURE_THRESHOLD,
            max_upload_bytes: MAX_UPLOAD_BYTES,
            zoom: ZoomLimits::default(),
        }
    }
}

impl Settings {
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.max(Duration::from_millis(1));
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout.max(Duration::from_millis(1));
        self
    }
}
