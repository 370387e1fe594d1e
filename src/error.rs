//! Error types for the layout sandbox

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for sandbox operations
pub type Result<T> = std::result::Result<T, Error>;

/// The step of a render session that produced a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStep {
    /// Creating the engine session from a `SessionConfig`
    Create,
    /// Binding the thread and initializing the session
    Init,
    /// Parsing the layout source into a live tree
    Inflate,
    /// Caller-supplied mutation of the inflated tree
    Mutate,
    /// Advancing virtual time and draining callbacks for a frame
    Frame,
    /// Measure/draw pass
    Render,
    /// Collecting view trees and the raster image
    Capture,
}

impl fmt::Display for RenderStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RenderStep::Create => "create",
            RenderStep::Init => "init",
            RenderStep::Inflate => "inflate",
            RenderStep::Mutate => "mutate",
            RenderStep::Frame => "frame",
            RenderStep::Render => "render",
            RenderStep::Capture => "capture",
        };
        f.write_str(name)
    }
}

/// Errors that can occur while building an environment or rendering
#[derive(Error, Debug)]
pub enum Error {
    /// A platform directory or file the engine needs is absent
    #[error("Missing platform artifact {}: {hint}", path.display())]
    MissingPlatformArtifact { path: PathBuf, hint: String },

    /// Invalid configuration detected while building
    #[error("Invalid configuration: {0}")]
    ConfigurationError(String),

    /// The engine refused to initialize; the handle is unusable
    #[error("Engine initialization failed: {0}")]
    EngineInitFault(String),

    /// A session step exceeded its wait budget (the session was released)
    #[error("Render session timed out during {step} after {timeout_ms}ms")]
    TimedOut { step: RenderStep, timeout_ms: u64 },

    /// A session step failed (the session was released)
    #[error("Rendering failed during {step}: {diagnostic}")]
    RenderFault { step: RenderStep, diagnostic: String },

    /// The inflation target already carries an incompatible view factory
    #[error("State conflict: {0}")]
    StateConflict(String),

    /// The engine handle was already disposed
    #[error("Engine handle used after dispose")]
    UseAfterDispose,

    /// Callbacks kept rescheduling themselves at or before the drain time
    #[error("Runaway scheduling: {iterations} callbacks executed while draining to {at_nanos}ns")]
    RunawayScheduling { iterations: usize, at_nanos: u64 },

    /// Filesystem error while reading environment inputs
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The background render worker stopped answering
    #[error("Worker error: {0}")]
    Worker(String),
}

impl Error {
    pub(crate) fn render_fault(step: RenderStep, diagnostic: impl Into<String>) -> Self {
        Error::RenderFault {
            step,
            diagnostic: diagnostic.into(),
        }
    }

    /// The failing step for per-call session errors, if any
    pub fn step(&self) -> Option<RenderStep> {
        match self {
            Error::TimedOut { step, .. } | Error::RenderFault { step, .. } => Some(*step),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_fault_display_names_step() {
        let err = Error::render_fault(RenderStep::Inflate, "bad tag <Foo>");
        assert_eq!(err.to_string(), "Rendering failed during inflate: bad tag <Foo>");
        assert_eq!(err.step(), Some(RenderStep::Inflate));
    }

    #[test]
    fn construction_errors_have_no_step() {
        let err = Error::MissingPlatformArtifact {
            path: PathBuf::from("/sdk/platforms/android-31"),
            hint: "install it".into(),
        };
        assert!(err.step().is_none());
        assert!(err.to_string().contains("android-31"));
    }

    #[test]
    fn view_factory_conflict_is_not_a_step_failure() {
        let err = Error::StateConflict("view factory 'other' already installed".into());
        assert!(err.step().is_none());
        let steps = [
            RenderStep::Create,
            RenderStep::Init,
            RenderStep::Inflate,
            RenderStep::Mutate,
            RenderStep::Frame,
            RenderStep::Render,
            RenderStep::Capture,
        ];
        let names: Vec<String> = steps.iter().map(ToString::to_string).collect();
        assert_eq!(names, ["create", "init", "inflate", "mutate", "frame", "render", "capture"]);
    }
}
