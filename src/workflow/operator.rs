//! Scripted driving of a running [`Workstation`](super::Workstation), as
//! used by the command line.

use tokio::sync::mpsc;

use super::command::{Command, Event, NoticeLevel, CAMERA_START_FAILED};
use crate::acquisition::AcquisitionMode;
use crate::annotate::AnnotatedImage;
use crate::capture::CapturedArtifact;
use crate::error::SmearscopeError;
use crate::model::AnalysisResult;
use crate::submit::SubmissionForm;

/// A finished analysis as seen by the operator.
#[derive(Debug)]
pub struct Completed {
    pub result: AnalysisResult,
    pub annotated: Option<AnnotatedImage>,
}

/// Turns events that end a scripted flow into errors.
fn failure(event: Event) -> Result<Event, SmearscopeError> {
    match event {
        Event::ValidationFailed(err) => Err(err.into()),
        Event::AnalysisFailed { message } | Event::ConfirmationFailed { message } => {
            Err(SmearscopeError::Rejected(message))
        }
        Event::PreviewTripped { message } => Err(SmearscopeError::PreviewTripped(message.into())),
        Event::SessionExpired { .. } => Err(SmearscopeError::SessionExpired),
        Event::Notice {
            level: NoticeLevel::Error,
            message,
        } if message == CAMERA_START_FAILED => Err(SmearscopeError::Rejected(message)),
        other => Ok(other),
    }
}

/// The operator's side of a workstation's channels.
///
/// Dropping it closes the command channel, which ends the workstation loop.
pub struct Operator {
    commands: mpsc::Sender<Command>,
    events: mpsc::UnboundedReceiver<Event>,
}

impl Operator {
    pub fn new(commands: mpsc::Sender<Command>, events: mpsc::UnboundedReceiver<Event>) -> Self {
        Self { commands, events }
    }

    pub async fn send(&self, command: Command) -> Result<(), SmearscopeError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| SmearscopeError::WorkflowEnded("the command was delivered"))
    }

    /// Waits for the first event `pick` accepts, failing on any event that
    /// ends the flow.
    pub async fn wait_for<T>(
        &mut self,
        what: &'static str,
        mut pick: impl FnMut(Event) -> Option<T>,
    ) -> Result<T, SmearscopeError> {
        while let Some(event) = self.events.recv().await {
            let event = failure(event)?;
            tracing::trace!(?event, "operator saw event");
            if let Some(found) = pick(event) {
                return Ok(found);
            }
        }
        Err(SmearscopeError::WorkflowEnded(what))
    }

    pub async fn wait_for_result(&mut self) -> Result<Completed, SmearscopeError> {
        self.wait_for("the analysis finished", |event| match event {
            Event::ResultReady { result, annotated } => Some(Completed {
                result: *result,
                annotated: annotated.map(|annotated| *annotated),
            }),
            _ => None,
        })
        .await
    }

    /// Submits `form` in upload mode; `form.upload` carries the file.
    pub async fn analyze_upload(
        &mut self,
        form: SubmissionForm,
    ) -> Result<Completed, SmearscopeError> {
        self.send(Command::SelectMode(AcquisitionMode::Upload)).await?;
        self.send(Command::Submit(form)).await?;
        self.wait_for_result().await
    }

    /// Starts the camera, waits for `settle_frames` preview frames, captures
    /// the displayed one and submits it.
    pub async fn capture_and_analyze(
        &mut self,
        form: SubmissionForm,
        settle_frames: u32,
    ) -> Result<Completed, SmearscopeError> {
        self.send(Command::SelectMode(AcquisitionMode::Camera)).await?;
        for _ in 0..settle_frames.max(1) {
            self.wait_for("a preview frame arrived", |event| {
                matches!(event, Event::FrameDisplayed { .. }).then_some(())
            })
            .await?;
        }

        self.send(Command::Capture).await?;
        let file_name = self
            .wait_for("the frame was captured", |event| match event {
                Event::Captured { file_name, .. } => Some(file_name),
                _ => None,
            })
            .await?;
        tracing::info!(%file_name, "frame captured");

        self.send(Command::Submit(form)).await?;
        let completed = self.wait_for_result().await;
        self.send(Command::SelectMode(AcquisitionMode::Upload)).await?;
        completed
    }

    /// The artifact chosen in upload mode, for flows that pick a file
    /// before filling in the rest of the form.
    pub async fn choose_upload(&mut self, file: CapturedArtifact) -> Result<(), SmearscopeError> {
        self.send(Command::ChooseUpload(file)).await?;
        self.wait_for("the file was checked", |event| {
            matches!(event, Event::UploadAccepted { .. }).then_some(())
        })
        .await
    }
}
