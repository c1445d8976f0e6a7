//! The workstation event loop.
//!
//! A [`Workstation`] owns every controller of one operator session and runs
//! them on a single cooperative loop ([`Workstation::run`]). Input arrives as
//! [`Command`]s on a channel; everything observable leaves as [`Event`]s.
//!
//! Network work never blocks the loop. Preview fetches, analysis and
//! confirmation requests and camera start/stop calls are boxed local futures
//! held in [`FuturesUnordered`] sets and polled alongside the command
//! channel and the poll timer. Dropping a future cancels its request, which
//! is how stopping the preview discards every outstanding fetch.

mod command;
mod operator;

pub use command::{
    Command, Event, NoticeLevel, ANALYSIS_COMPLETE, CAMERA_START_FAILED, RESULT_CONFIRMED,
    SIGN_IN_PATH, SWITCHED_TO_UPLOAD,
};
pub use operator::{Completed, Operator};

use std::fmt;
use std::rc::Rc;

use futures::future::LocalBoxFuture;
use futures::stream::FuturesUnordered;
use futures::{FutureExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::{Interval, MissedTickBehavior};

use crate::acquisition::{AcquisitionMode, ModeController, Transition};
use crate::annotate;
use crate::backend::{with_timeout, Backend, BackendError};
use crate::capture::{CaptureManager, CapturedArtifact, PreviewSurface};
use crate::config::Settings;
use crate::error::SmearscopeError;
use crate::model::{AnalysisResult, ConfirmationReceipt, ResultLabel};
use crate::preview::{fetch_frame, FrameOutcome, PollStep, PollerState, PreviewSession};
use crate::submit::{AnalysisSubmitter, SubmissionError, SubmissionForm};
use crate::validation::{self, ValidationError};
use crate::viewport::ResultSurface;

/// Why the preview is being stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum StopReason {
    LeftCamera,
    Hidden,
    Tripped,
    SessionExpired,
    Reset,
    Unload,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            StopReason::LeftCamera => "left camera mode",
            StopReason::Hidden => "page hidden",
            StopReason::Tripped => "too many failures",
            StopReason::SessionExpired => "session expired",
            StopReason::Reset => "workflow reset",
            StopReason::Unload => "unload",
        };
        f.write_str(text)
    }
}

enum CameraStart {
    Ready,
    SessionInvalid,
    Failed(BackendError),
}

enum Housekeeping {
    CameraStarted { generation: u64, outcome: CameraStart },
    TornDown(Result<(), BackendError>),
}

enum RequestDone {
    Analysis {
        image: CapturedArtifact,
        outcome: Result<AnalysisResult, SubmissionError>,
    },
    Confirmation(Result<ConfirmationReceipt, SubmissionError>),
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

/// One operator session: mode, preview, capture, submission and result view.
pub struct Workstation<B> {
    backend: Rc<B>,
    settings: Settings,
    events: mpsc::UnboundedSender<Event>,

    mode: ModeController,
    preview: PreviewSession,
    frames: PreviewSurface,
    capture: CaptureManager,
    upload: Option<CapturedArtifact>,
    submitter: AnalysisSubmitter,
    surface: ResultSurface,
    hidden: bool,

    ticker: Option<Interval>,
    in_flight: FuturesUnordered<LocalBoxFuture<'static, FrameOutcome>>,
    requests: FuturesUnordered<LocalBoxFuture<'static, RequestDone>>,
    housekeeping: FuturesUnordered<LocalBoxFuture<'static, Housekeeping>>,

    /// Bumped whenever a camera start is requested or the preview stops, so
    /// a start that completes late can be recognised as stale.
    camera_generation: u64,
    pending_start: Option<u64>,
    /// The backend preview was started and not yet torn down.
    backend_preview_live: bool,
}

impl<B: Backend + 'static> Workstation<B> {
    pub fn new(backend: B, settings: Settings) -> (Self, mpsc::UnboundedReceiver<Event>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let workstation = Self {
            backend: Rc::new(backend),
            preview: PreviewSession::new(settings.failure_threshold),
            submitter: AnalysisSubmitter::new(settings.request_timeout, settings.max_upload_bytes),
            surface: ResultSurface::new(settings.zoom),
            settings,
            events,
            mode: ModeController::new(),
            frames: PreviewSurface::new(),
            capture: CaptureManager::new(),
            upload: None,
            hidden: false,
            ticker: None,
            in_flight: FuturesUnordered::new(),
            requests: FuturesUnordered::new(),
            housekeeping: FuturesUnordered::new(),
            camera_generation: 0,
            pending_start: None,
            backend_preview_live: false,
        };
        (workstation, receiver)
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn mode(&self) -> AcquisitionMode {
        self.mode.mode()
    }

    pub fn preview_state(&self) -> PollerState {
        self.preview.state()
    }

    pub fn captured(&self) -> Option<&CapturedArtifact> {
        self.capture.artifact()
    }

    pub fn surface(&self) -> &ResultSurface {
        &self.surface
    }

    pub fn is_submitting(&self) -> bool {
        self.submitter.is_submitting()
    }

    /// Processes commands until [`Command::Unload`] or until every sender is
    /// dropped, then stops the preview and waits for its teardown.
    pub async fn run(&mut self, mut commands: mpsc::Receiver<Command>) {
        tracing::debug!("workstation started");
        loop {
            tokio::select! {
                biased;

                command = commands.recv() => match command {
                    Some(Command::Unload) | None => break,
                    Some(command) => self.handle(command),
                },
                Some(outcome) = self.in_flight.next(), if !self.in_flight.is_empty() => {
                    self.on_frame(outcome);
                }
                Some(done) = self.requests.next(), if !self.requests.is_empty() => {
                    self.on_request_done(done);
                }
                Some(done) = self.housekeeping.next(), if !self.housekeeping.is_empty() => {
                    self.on_housekeeping(done);
                }
                _ = next_tick(&mut self.ticker), if self.preview.is_active() => {
                    self.issue_fetch();
                }
            }
        }
        self.shutdown().await;
    }

    async fn shutdown(&mut self) {
        self.stop_preview(StopReason::Unload);
        self.requests.clear();
        while let Some(done) = self.housekeeping.next().await {
            self.on_housekeeping(done);
        }
        tracing::debug!("workstation stopped");
    }

    fn emit(&self, event: Event) {
        // A closed receiver only means nobody is watching any more.
        let _ = self.events.send(event);
    }

    fn notice(&self, level: NoticeLevel, message: impl Into<String>) {
        self.emit(Event::Notice {
            level,
            message: message.into(),
        });
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::SelectMode(mode) => self.select_mode(mode),
            Command::SwitchToUpload => {
                self.select_mode(AcquisitionMode::Upload);
                self.notice(NoticeLevel::Info, SWITCHED_TO_UPLOAD);
            }
            Command::ChooseUpload(file) => self.choose_upload(file),
            Command::Capture => self.capture(),
            Command::Submit(form) => self.submit(form),
            Command::Confirm { result, notes } => self.confirm(result, notes),
            Command::VisibilityChanged { hidden } => {
                self.hidden = hidden;
                if hidden && self.mode.is_camera() {
                    self.stop_preview(StopReason::Hidden);
                }
            }
            Command::Pointer(input) => {
                if self.surface.handle(input) {
                    self.emit(Event::ViewportChanged(self.surface.viewport().state()));
                }
            }
            Command::Reset => self.reset(),
            // Handled by the loop.
            Command::Unload => {}
        }
    }

    fn select_mode(&mut self, target: AcquisitionMode) {
        match self.mode.plan(target) {
            Transition::EnterCamera => {
                self.mode.commit(target);
                self.emit(Event::ModeChanged(target));
                self.start_camera();
            }
            Transition::LeaveCamera => {
                self.stop_preview(StopReason::LeftCamera);
                self.preview.stop();
                self.capture.clear();
                self.mode.commit(target);
                self.emit(Event::ModeChanged(target));
            }
            // Leaves the poller alone, tripped or hidden included.
            Transition::Unchanged => {}
        }
    }

    fn start_camera(&mut self) {
        self.camera_generation += 1;
        let generation = self.camera_generation;
        self.pending_start = Some(generation);

        let backend = Rc::clone(&self.backend);
        let timeout = self.settings.request_timeout;
        self.housekeeping.push(
            async move {
                let outcome = match with_timeout(timeout, backend.current_user()).await {
                    Err(BackendError::Unauthorized) | Err(BackendError::Status { .. }) => {
                        CameraStart::SessionInvalid
                    }
                    Err(other) => CameraStart::Failed(other),
                    Ok(_) => match with_timeout(timeout, backend.start_preview()).await {
                        Ok(()) => CameraStart::Ready,
                        Err(BackendError::Unauthorized) => CameraStart::SessionInvalid,
                        // A refusal still answered; polling runs and trips
                        // if no frames come.
                        Err(err @ BackendError::Status { .. }) => {
                            tracing::warn!(error = %err, "start-preview refused, polling anyway");
                            CameraStart::Ready
                        }
                        Err(other) => CameraStart::Failed(other),
                    },
                };
                Housekeeping::CameraStarted {
                    generation,
                    outcome,
                }
            }
            .boxed_local(),
        );
    }

    /// The single stop routine. Idempotent.
    fn stop_preview(&mut self, reason: StopReason) {
        self.camera_generation += 1;
        self.pending_start = None;
        self.ticker = None;
        self.in_flight.clear();

        let was_polling = self.preview.is_active();
        if was_polling {
            self.preview.stop();
        }
        self.frames.blank();
        if was_polling {
            tracing::info!(%reason, "preview stopped");
            self.emit(Event::PreviewStopped);
        }

        if std::mem::take(&mut self.backend_preview_live) {
            self.tear_down_backend_preview();
        }
    }

    fn tear_down_backend_preview(&mut self) {
        let backend = Rc::clone(&self.backend);
        let timeout = self.settings.request_timeout;
        self.housekeeping.push(
            async move {
                let outcome = with_timeout(timeout, backend.stop_preview()).await;
                Housekeeping::TornDown(outcome)
            }
            .boxed_local(),
        );
    }

    fn expire_session(&mut self) {
        self.stop_preview(StopReason::SessionExpired);
        self.emit(Event::SessionExpired {
            redirect: SIGN_IN_PATH,
        });
    }

    fn issue_fetch(&mut self) {
        let backend = Rc::clone(&self.backend);
        let timeout = self.settings.request_timeout;
        tracing::debug!(in_flight = self.in_flight.len(), "requesting preview frame");
        self.in_flight
            .push(async move { fetch_frame(&*backend, timeout).await }.boxed_local());
    }

    fn on_frame(&mut self, outcome: FrameOutcome) {
        match self.preview.record(outcome) {
            PollStep::Display(bytes) => {
                let byte_size = bytes.len();
                self.frames.show(bytes);
                self.emit(Event::FrameDisplayed { byte_size });
            }
            PollStep::Retry { .. } | PollStep::Ignored => {}
            PollStep::Tripped(notice) => {
                tracing::error!(cause = %notice.cause, "camera preview tripped");
                self.stop_preview(StopReason::Tripped);
                self.emit(Event::PreviewTripped {
                    message: notice.message,
                });
                self.notice(NoticeLevel::Error, notice.message);
            }
            PollStep::SessionExpired => self.expire_session(),
        }
    }

    fn on_housekeeping(&mut self, done: Housekeeping) {
        match done {
            Housekeeping::CameraStarted {
                generation,
                outcome,
            } => self.on_camera_started(generation, outcome),
            Housekeeping::TornDown(Ok(())) => tracing::debug!("backend preview torn down"),
            Housekeeping::TornDown(Err(err)) => {
                tracing::debug!(error = %err, "ignoring preview teardown failure");
            }
        }
    }

    fn on_camera_started(&mut self, generation: u64, outcome: CameraStart) {
        let current = self.pending_start == Some(generation);
        if current {
            self.pending_start = None;
        }

        match outcome {
            CameraStart::Ready if current && self.mode.is_camera() && !self.hidden => {
                self.backend_preview_live = true;
                self.preview.start();
                let mut ticker = tokio::time::interval(self.settings.poll_interval);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                self.ticker = Some(ticker);
                tracing::info!(interval = ?self.settings.poll_interval, "preview polling started");
                self.emit(Event::PreviewStarted);
            }
            CameraStart::Ready => {
                tracing::debug!("camera start superseded, tearing down");
                self.tear_down_backend_preview();
            }
            CameraStart::SessionInvalid if current => {
                self.mode.commit(AcquisitionMode::Upload);
                self.emit(Event::ModeChanged(AcquisitionMode::Upload));
                self.expire_session();
            }
            CameraStart::Failed(err) if current => {
                tracing::warn!(error = %err, "camera preview did not start");
                self.notice(NoticeLevel::Error, CAMERA_START_FAILED);
            }
            CameraStart::SessionInvalid | CameraStart::Failed(_) => {}
        }
    }

    fn choose_upload(&mut self, file: CapturedArtifact) {
        match validation::check_upload(&file, self.settings.max_upload_bytes) {
            Ok(()) => {
                tracing::info!(
                    file_name = file.file_name(),
                    bytes = file.byte_size(),
                    "upload chosen"
                );
                self.emit(Event::UploadAccepted {
                    file_name: file.file_name().to_string(),
                });
                self.upload = Some(file);
            }
            Err(err) => {
                self.upload = None;
                self.reject(err);
            }
        }
    }

    fn reject(&self, err: ValidationError) {
        tracing::debug!(code = ?err.code, "rejected: {}", err);
        self.emit(Event::ValidationFailed(err));
    }

    fn capture(&mut self) {
        match self.capture.capture(&self.frames) {
            Ok(artifact) => {
                let event = Event::Captured {
                    file_name: artifact.file_name().to_string(),
                    byte_size: artifact.byte_size(),
                };
                self.emit(event);
            }
            Err(err) => self.reject(err),
        }
    }

    fn submit(&mut self, mut form: SubmissionForm) {
        if form.upload.is_none() {
            form.upload = self.upload.clone();
        }
        let pending = match self
            .submitter
            .prepare(self.mode.mode(), form, self.capture.artifact())
        {
            Ok(pending) => pending,
            Err(SubmissionError::Invalid(err)) => return self.reject(err),
            Err(other) => {
                return self.emit(Event::AnalysisFailed {
                    message: other.to_string(),
                })
            }
        };

        let image = pending.image().clone();
        let backend = Rc::clone(&self.backend);
        self.requests.push(
            async move {
                let outcome = pending.send(&*backend).await;
                RequestDone::Analysis { image, outcome }
            }
            .boxed_local(),
        );
        self.emit(Event::SubmissionStarted);
    }

    fn confirm(&mut self, result: Option<ResultLabel>, notes: Option<String>) {
        let pending =
            match self
                .submitter
                .prepare_confirmation(self.surface.result_id(), result, notes)
            {
                Ok(pending) => pending,
                Err(SubmissionError::Invalid(err)) => return self.reject(err),
                Err(other) => {
                    return self.emit(Event::ConfirmationFailed {
                        message: other.to_string(),
                    })
                }
            };

        let backend = Rc::clone(&self.backend);
        self.requests.push(
            async move { RequestDone::Confirmation(pending.send(&*backend).await) }.boxed_local(),
        );
    }

    fn on_request_done(&mut self, done: RequestDone) {
        match done {
            RequestDone::Analysis {
                image,
                outcome: Ok(result),
            } => self.show_result(image, result),
            RequestDone::Confirmation(Ok(receipt)) => {
                tracing::info!(result_id = %receipt.test_result_id, "result confirmed");
                self.notice(NoticeLevel::Success, RESULT_CONFIRMED);
                self.emit(Event::Confirmed(receipt));
            }
            RequestDone::Analysis {
                outcome: Err(SubmissionError::SessionExpired),
                ..
            }
            | RequestDone::Confirmation(Err(SubmissionError::SessionExpired)) => {
                self.expire_session()
            }
            RequestDone::Analysis {
                outcome: Err(err), ..
            } => {
                tracing::warn!(error = %err, "analysis failed");
                self.notice(NoticeLevel::Error, err.to_string());
                self.emit(Event::AnalysisFailed {
                    message: err.to_string(),
                });
            }
            RequestDone::Confirmation(Err(err)) => {
                tracing::warn!(error = %err, "confirmation failed");
                self.notice(NoticeLevel::Error, err.to_string());
                self.emit(Event::ConfirmationFailed {
                    message: err.to_string(),
                });
            }
        }
    }

    fn show_result(&mut self, image: CapturedArtifact, result: AnalysisResult) {
        let annotated = annotate::decode(image.bytes())
            .map_err(SmearscopeError::ImageDecode)
            .and_then(|source| annotate::annotate(&source, &result.detections));

        let annotated = match annotated {
            Ok(annotated) => {
                self.surface.show(result.result_id, annotated.raster.clone());
                Some(Box::new(annotated))
            }
            Err(err) => {
                tracing::warn!(error = %err, "could not render detections");
                self.surface.show_unrendered(result.result_id);
                None
            }
        };

        self.notice(NoticeLevel::Success, ANALYSIS_COMPLETE);
        self.emit(Event::ResultReady {
            result: Box::new(result),
            annotated,
        });
    }

    fn reset(&mut self) {
        self.stop_preview(StopReason::Reset);
        self.preview.stop();
        self.requests.clear();
        self.capture.clear();
        self.upload = None;
        self.surface.clear();
        if self.mode.is_camera() {
            self.mode.commit(AcquisitionMode::Upload);
            self.emit(Event::ModeChanged(AcquisitionMode::Upload));
        }
        self.emit(Event::Reset);
    }
}
