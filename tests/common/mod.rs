#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::io::Cursor;
use std::rc::Rc;
use std::time::Duration;

use bytes::Bytes;
use image::{ImageFormat, Rgb, RgbImage};
use smearscope::backend::{AnalysisRequest, Backend, BackendError};
use smearscope::model::{
    AnalysisResult, BBoxXYXY, Confirmation, ConfirmationReceipt, Detection, ResultId, ResultLabel,
    UserProfile,
};
use uuid::Uuid;

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let raster = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x * 7 % 256) as u8, (y * 5 % 256) as u8, 90])
    });
    let mut out = Vec::new();
    raster
        .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
        .expect("encode png");
    out
}

pub fn trophozoite() -> Detection {
    Detection::new(
        BBoxXYXY::from_xyxy(10.0, 10.0, 50.0, 50.0),
        "trophozoite",
        0.91,
    )
}

pub fn result_id(n: u128) -> ResultId {
    ResultId::new(Uuid::from_u128(n))
}

/// How the fake answers one preview fetch.
#[derive(Clone, Debug)]
pub enum FrameReply {
    Frame(Bytes),
    Status(u16),
    Unauthorized,
    /// Never answers.
    Hang,
    Delayed(Duration, Bytes),
}

/// How the fake answers one analysis.
#[derive(Clone, Debug)]
pub enum AnalyzeReply {
    Detections(Vec<Detection>),
    Status(u16, Option<&'static str>),
    Unauthorized,
    Transport,
}

/// How the fake answers start-preview and stop-preview.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlReply {
    Ok,
    Status(u16),
    Transport,
}

impl ControlReply {
    fn into_result(self) -> Result<(), BackendError> {
        match self {
            ControlReply::Ok => Ok(()),
            ControlReply::Status(status) => Err(BackendError::Status {
                status,
                detail: None,
            }),
            ControlReply::Transport => Err(BackendError::Transport("connection reset".into())),
        }
    }
}

/// Shared between the fake and the test so calls can be inspected while
/// the workstation owns the backend.
pub struct FakeState {
    pub session_valid: Cell<bool>,
    pub profile_clinic: RefCell<Option<String>>,
    frames: RefCell<VecDeque<FrameReply>>,
    default_frame: RefCell<FrameReply>,
    analyses: RefCell<VecDeque<AnalyzeReply>>,
    pub analyze_delay: Cell<Duration>,
    pub start_reply: Cell<ControlReply>,
    pub stop_reply: Cell<ControlReply>,
    pub requests: RefCell<Vec<AnalysisRequest>>,
    pub confirmations: RefCell<Vec<(ResultId, Confirmation)>>,

    pub user_calls: Cell<u32>,
    pub start_calls: Cell<u32>,
    pub stop_calls: Cell<u32>,
    pub frame_calls: Cell<u32>,
    pub analyze_calls: Cell<u32>,
    pub confirm_calls: Cell<u32>,
}

impl FakeState {
    pub fn script_frames(&self, replies: impl IntoIterator<Item = FrameReply>) {
        self.frames.borrow_mut().extend(replies);
    }

    pub fn set_default_frame(&self, reply: FrameReply) {
        *self.default_frame.borrow_mut() = reply;
    }

    pub fn script_analyses(&self, replies: impl IntoIterator<Item = AnalyzeReply>) {
        self.analyses.borrow_mut().extend(replies);
    }

    pub fn total_calls(&self) -> u32 {
        self.user_calls.get()
            + self.start_calls.get()
            + self.stop_calls.get()
            + self.frame_calls.get()
            + self.analyze_calls.get()
            + self.confirm_calls.get()
    }
}

fn bump(counter: &Cell<u32>) {
    counter.set(counter.get() + 1);
}

pub struct FakeBackend {
    state: Rc<FakeState>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self {
            state: Rc::new(FakeState {
                session_valid: Cell::new(true),
                profile_clinic: RefCell::new(Some("clinic-7".to_string())),
                frames: RefCell::new(VecDeque::new()),
                default_frame: RefCell::new(FrameReply::Frame(Bytes::from(png_bytes(64, 48)))),
                analyses: RefCell::new(VecDeque::new()),
                analyze_delay: Cell::new(Duration::ZERO),
                start_reply: Cell::new(ControlReply::Ok),
                stop_reply: Cell::new(ControlReply::Ok),
                requests: RefCell::new(Vec::new()),
                confirmations: RefCell::new(Vec::new()),
                user_calls: Cell::new(0),
                start_calls: Cell::new(0),
                stop_calls: Cell::new(0),
                frame_calls: Cell::new(0),
                analyze_calls: Cell::new(0),
                confirm_calls: Cell::new(0),
            }),
        }
    }

    pub fn state(&self) -> Rc<FakeState> {
        Rc::clone(&self.state)
    }
}

impl Backend for FakeBackend {
    async fn current_user(&self) -> Result<UserProfile, BackendError> {
        bump(&self.state.user_calls);
        if !self.state.session_valid.get() {
            return Err(BackendError::Unauthorized);
        }
        Ok(UserProfile {
            first_name: "Ada".into(),
            last_name: "Okafor".into(),
            clinic_id: self.state.profile_clinic.borrow().clone(),
        })
    }

    async fn start_preview(&self) -> Result<(), BackendError> {
        bump(&self.state.start_calls);
        self.state.start_reply.get().into_result()
    }

    async fn stop_preview(&self) -> Result<(), BackendError> {
        bump(&self.state.stop_calls);
        self.state.stop_reply.get().into_result()
    }

    async fn preview_frame(&self) -> Result<Bytes, BackendError> {
        bump(&self.state.frame_calls);
        let scripted = self.state.frames.borrow_mut().pop_front();
        let reply = scripted.unwrap_or_else(|| self.state.default_frame.borrow().clone());
        match reply {
            FrameReply::Frame(bytes) => Ok(bytes),
            FrameReply::Status(status) => Err(BackendError::Status {
                status,
                detail: None,
            }),
            FrameReply::Unauthorized => Err(BackendError::Unauthorized),
            FrameReply::Hang => std::future::pending().await,
            FrameReply::Delayed(delay, bytes) => {
                tokio::time::sleep(delay).await;
                Ok(bytes)
            }
        }
    }

    async fn analyze(&self, request: AnalysisRequest) -> Result<AnalysisResult, BackendError> {
        bump(&self.state.analyze_calls);
        let n = self.state.analyze_calls.get();
        self.state.requests.borrow_mut().push(request);

        let delay = self.state.analyze_delay.get();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let scripted = self.state.analyses.borrow_mut().pop_front();
        match scripted.unwrap_or(AnalyzeReply::Detections(vec![trophozoite()])) {
            AnalyzeReply::Detections(detections) => Ok(AnalysisResult {
                result_id: result_id(u128::from(n)),
                label: ResultLabel::Positive,
                confidence: 0.91,
                processing_time_ms: 412.0,
                detections,
                message: None,
            }),
            AnalyzeReply::Status(status, detail) => Err(BackendError::Status {
                status,
                detail: detail.map(str::to_string),
            }),
            AnalyzeReply::Unauthorized => Err(BackendError::Unauthorized),
            AnalyzeReply::Transport => Err(BackendError::Transport("connection refused".into())),
        }
    }

    async fn confirm(
        &self,
        result_id: ResultId,
        confirmation: Confirmation,
    ) -> Result<ConfirmationReceipt, BackendError> {
        bump(&self.state.confirm_calls);
        self.state
            .confirmations
            .borrow_mut()
            .push((result_id, confirmation));
        Ok(ConfirmationReceipt {
            test_result_id: result_id,
            is_confirmed: true,
            confirmed_by: Some("Ada Okafor".into()),
            confirmed_at: None,
            message: "Result confirmed".into(),
        })
    }
}
