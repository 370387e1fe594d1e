//! Rendering engine boundary.
//!
//! The sandbox never reaches into an engine: everything it needs (clock
//! epoch, first-frame state, scheduled-callback draining, view factory hooks)
//! is part of these traits. Engines are driven from a single thread and are
//! not required to be `Send`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::capture::RasterImage;
use crate::clock::VirtualClock;
use crate::environment::EngineProperties;
use crate::session::SessionConfig;

pub mod scripted;

pub use scripted::{EngineCounters, ScriptedEngine, ScriptedRoot, ScriptedView};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// The engine reported a failure
    Error,
    /// The engine gave up waiting within the allowed duration
    Timeout,
}

/// A failure reported by the engine, with its native diagnostic.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct EngineFault {
    pub kind: FaultKind,
    pub message: String,
}

impl EngineFault {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: FaultKind::Error,
            message: message.into(),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            kind: FaultKind::Timeout,
            message: message.into(),
        }
    }
}

pub type EngineResult<T = ()> = std::result::Result<T, EngineFault>;

/// View-creation hook consulted during inflation.
///
/// The compatibility layer for richer widget sets is exposed to the sandbox
/// through this trait.
pub trait ViewFactory: Send + Sync {
    /// Stable identity used to detect which factory a session carries.
    fn id(&self) -> &str;

    /// Class to instantiate for tag `name`, or `None` to use the engine default.
    fn create_view(&self, parent: Option<&str>, name: &str) -> Option<String>;
}

/// View information as reported by the engine.
///
/// Geometry fields use `i32::MIN` for values the engine never measured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawView {
    pub class_name: String,
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
    pub baseline: i32,
    pub left_margin: i32,
    pub top_margin: i32,
    pub right_margin: i32,
    pub bottom_margin: i32,
    pub children: Vec<RawView>,
}

impl RawView {
    pub const UNMEASURED: i32 = i32::MIN;

    /// A view with every geometry field unmeasured.
    pub fn unmeasured(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            left: Self::UNMEASURED,
            top: Self::UNMEASURED,
            right: Self::UNMEASURED,
            bottom: Self::UNMEASURED,
            baseline: Self::UNMEASURED,
            left_margin: Self::UNMEASURED,
            top_margin: Self::UNMEASURED,
            right_margin: Self::UNMEASURED,
            bottom_margin: Self::UNMEASURED,
            children: Vec::new(),
        }
    }
}

/// Everything the engine hands back after the last frame.
#[derive(Debug, Clone)]
pub struct EngineCapture {
    pub system_views: Vec<RawView>,
    pub root_views: Vec<RawView>,
    pub image: RasterImage,
}

/// A long-lived engine instance bound to one environment.
pub trait RenderEngine {
    type Session: RenderSession;

    /// One-time initialization with the static engine configuration.
    fn init(&mut self, properties: &EngineProperties, asset_paths: &[PathBuf]) -> EngineResult;

    /// Capability probe for the optional compatibility widget layer.
    fn probe_compat_layer(&self) -> Option<Arc<dyn ViewFactory>> {
        None
    }

    /// Bind engine state to the calling thread.
    fn prepare_thread(&mut self);

    /// Undo [`RenderEngine::prepare_thread`].
    fn cleanup_thread(&mut self);

    fn create_session(&mut self, config: &SessionConfig) -> EngineResult<Self::Session>;

    /// Release all engine-wide resources. Called exactly once.
    fn dispose(&mut self);
}

/// One inflate + render cycle.
pub trait RenderSession {
    /// Live element tree handed to caller mutation code.
    type Root;

    fn set_elapsed_time(&mut self, nanos: u64);

    /// Mark the engine's first frame as executed so no cold-start path runs.
    fn set_first_frame_executed(&mut self, executed: bool);

    fn init(&mut self, timeout: Duration) -> EngineResult;

    /// Identity of the view factory already attached to the inflater, if any.
    fn installed_view_factory(&self) -> Option<String>;

    fn install_view_factory(&mut self, factory: Arc<dyn ViewFactory>);

    /// Parse the layout source into a live tree. Engine work that must happen
    /// later is scheduled on `clock`.
    fn inflate(&mut self, clock: &mut VirtualClock) -> EngineResult;

    fn root_mut(&mut self) -> Option<&mut Self::Root>;

    fn set_showing_layout_bounds(&mut self, show: bool);

    /// Run engine-internal callbacks (handlers, frame callbacks) due at `now`.
    fn drain_scheduled_callbacks(&mut self, now: u64) -> EngineResult;

    /// Measure and draw at the current elapsed time.
    fn render(&mut self, force_measure: bool, clock: &mut VirtualClock) -> EngineResult;

    fn capture(&self) -> EngineResult<EngineCapture>;

    /// Free session resources. Called exactly once per created session.
    fn release(&mut self);
}
