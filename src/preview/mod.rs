//! Short-poll camera preview with consecutive-failure escalation.
//!
//! [`PreviewSession`] is the state machine (Idle -> Polling -> Tripped). It
//! does no I/O: the workstation issues one fetch per poll interval while the
//! session is polling, regardless of outstanding fetches, and feeds every
//! resolved [`FrameOutcome`] back through [`PreviewSession::record`] in the
//! order the fetches resolve.

use std::fmt;
use std::time::Duration;

use bytes::Bytes;

use crate::backend::{with_timeout, Backend, BackendError};

/// Shown when the threshold is reached through non-success statuses.
pub const UNAVAILABLE_MESSAGE: &str = "Camera preview unavailable. Please check camera connection.";
/// Shown when the threshold is reached through timeouts.
pub const TOO_SLOW_MESSAGE: &str =
    "Camera preview is taking too long to respond. Please check the camera.";
/// Shown when the threshold is reached through any other failure.
pub const GENERIC_MESSAGE: &str = "Failed to load camera preview.";

/// Why a single preview fetch failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureKind {
    /// The backend answered with a non-success status.
    Status(u16),
    /// No answer within the per-request timeout; the request was cancelled.
    Timeout,
    /// Connection or decoding failure.
    Transport,
}

impl FailureKind {
    /// The operator-facing message used when this failure trips the session.
    pub fn message(&self) -> &'static str {
        match self {
            FailureKind::Status(_) => UNAVAILABLE_MESSAGE,
            FailureKind::Timeout => TOO_SLOW_MESSAGE,
            FailureKind::Transport => GENERIC_MESSAGE,
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Status(status) => write!(f, "status {}", status),
            FailureKind::Timeout => f.write_str("timeout"),
            FailureKind::Transport => f.write_str("transport error"),
        }
    }
}

/// The result of one preview fetch.
#[derive(Clone, Debug, PartialEq)]
pub enum FrameOutcome {
    Frame(Bytes),
    Failed(FailureKind),
    /// The credential was rejected; the whole flow must stop.
    Unauthorized,
}

impl From<Result<Bytes, BackendError>> for FrameOutcome {
    fn from(result: Result<Bytes, BackendError>) -> Self {
        match result {
            Ok(bytes) => FrameOutcome::Frame(bytes),
            Err(BackendError::Unauthorized) => FrameOutcome::Unauthorized,
            Err(BackendError::Status { status, .. }) => {
                FrameOutcome::Failed(FailureKind::Status(status))
            }
            Err(BackendError::Timeout(_)) => FrameOutcome::Failed(FailureKind::Timeout),
            Err(BackendError::Transport(_)) | Err(BackendError::Decode(_)) => {
                FrameOutcome::Failed(FailureKind::Transport)
            }
        }
    }
}

/// Fetches one frame, bounded by `timeout`.
///
/// Exceeding the timeout drops the request future, which cancels the
/// underlying HTTP exchange; each call yields exactly one outcome.
pub async fn fetch_frame<B: Backend>(backend: &B, timeout: Duration) -> FrameOutcome {
    FrameOutcome::from(with_timeout(timeout, backend.preview_frame()).await)
}

/// Lifecycle of the preview poller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PollerState {
    /// Not polling.
    Idle,
    /// Issuing one fetch per interval.
    Polling { consecutive_failures: u32 },
    /// Stopped after too many consecutive failures.
    Tripped { cause: FailureKind },
}

/// Raised once when the session trips.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FailureNotice {
    pub cause: FailureKind,
    pub message: &'static str,
}

/// What the caller should do with a recorded outcome.
#[derive(Clone, Debug, PartialEq)]
pub enum PollStep {
    /// Display this frame; the failure counter was reset.
    Display(Bytes),
    /// A failure was counted; polling continues.
    Retry { consecutive_failures: u32 },
    /// The threshold was reached: stop polling, tear down the backend
    /// preview, and show the notice.
    Tripped(FailureNotice),
    /// The credential was rejected: stop polling and treat the session as
    /// expired.
    SessionExpired,
    /// The session is not polling; the outcome is stale and discarded.
    Ignored,
}

/// Preview polling state, owned by the workstation.
#[derive(Debug)]
pub struct PreviewSession {
    state: PollerState,
    failure_threshold: u32,
}

impl PreviewSession {
    pub fn new(failure_threshold: u32) -> Self {
        Self {
            state: PollerState::Idle,
            failure_threshold: failure_threshold.max(1),
        }
    }

    pub fn state(&self) -> PollerState {
        self.state
    }

    /// True only while fetches should be issued.
    pub fn is_active(&self) -> bool {
        matches!(self.state, PollerState::Polling { .. })
    }

    pub fn consecutive_failures(&self) -> u32 {
        match self.state {
            PollerState::Polling {
                consecutive_failures,
            } => consecutive_failures,
            _ => 0,
        }
    }

    /// Begins polling with a fresh counter. Returns false if already polling.
    pub fn start(&mut self) -> bool {
        if self.is_active() {
            return false;
        }
        self.state = PollerState::Polling {
            consecutive_failures: 0,
        };
        true
    }

    /// Returns to Idle. Returns true if the session was polling.
    pub fn stop(&mut self) -> bool {
        let was_active = self.is_active();
        self.state = PollerState::Idle;
        was_active
    }

    /// Applies one resolved fetch.
    pub fn record(&mut self, outcome: FrameOutcome) -> PollStep {
        let PollerState::Polling {
            consecutive_failures,
        } = self.state
        else {
            return PollStep::Ignored;
        };

        match outcome {
            FrameOutcome::Frame(bytes) => {
                self.state = PollerState::Polling {
                    consecutive_failures: 0,
                };
                PollStep::Display(bytes)
            }
            FrameOutcome::Unauthorized => {
                self.state = PollerState::Idle;
                PollStep::SessionExpired
            }
            FrameOutcome::Failed(cause) => {
                let failures = consecutive_failures + 1;
                tracing::warn!(%cause, failures, "preview fetch failed");
                if failures >= self.failure_threshold {
                    self.state = PollerState::Tripped { cause };
                    PollStep::Tripped(FailureNotice {
                        cause,
                        message: cause.message(),
                    })
                } else {
                    self.state = PollerState::Polling {
                        consecutive_failures: failures,
                    };
                    PollStep::Retry {
                        consecutive_failures: failures,
                    }
                }
            }
        }
    }
}
