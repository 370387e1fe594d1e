//! RFox Layout Sandbox
//!
//! Deterministic off-screen rendering of declarative UI layouts, for
//! screenshot and visual-regression tooling.
//!
//! An [`EnvironmentContext`] resolves the project, its libraries and the
//! platform SDK once. A [`Sandbox`] owns an initialized engine for that
//! environment and runs each render call as an isolated session: create,
//! init, inflate, caller mutation, frames on a [`VirtualClock`], capture,
//! release. Nothing in a render reads wall-clock time.
//!
//! # Features
//!
//! - **Layered resources**: local > module > library > framework precedence
//!   with qualifier-aware lookup
//! - **Virtual time**: callbacks run in due order, to a fixpoint, per frame
//! - **Guaranteed release**: every created session is released exactly once
//! - **`worker`** (default): [`SandboxWorker`], an async handle that drives a
//!   sandbox on its own thread
//!
//! # Example
//!
//! ```no_run
//! use rflayout::{EnvironmentContext, EnvironmentOptions, Sandbox, ScriptedEngine};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let env = EnvironmentContext::build(EnvironmentOptions::new("app", "/opt/android-sdk"))?;
//! let mut sandbox = Sandbox::new(&env, ScriptedEngine::new())?;
//! let config = sandbox.session_builder().with_decor(true).build()?;
//! let data = sandbox.render(&config)?;
//! println!("{}", data.image.digest());
//! sandbox.close()?;
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeMap;
use std::time::Duration;

pub mod error;
pub use error::{Error, RenderStep, Result};

pub mod capture;
pub mod clock;
pub mod device;
pub mod engine;
pub mod environment;
pub mod resources;
pub mod sandbox;
pub mod session;

// Async-friendly sandbox API (single worker thread per engine)
#[cfg(feature = "worker")]
pub mod worker;

pub use capture::{RasterImage, RenderData, ViewNode};
pub use clock::VirtualClock;
pub use device::DeviceProfile;
pub use engine::{RenderEngine, RenderSession, ScriptedEngine};
pub use environment::{EnvironmentContext, EnvironmentOptions};
pub use sandbox::{RenderOptions, Sandbox};
pub use session::{SessionConfig, SessionConfigBuilder};
#[cfg(feature = "worker")]
pub use worker::SandboxWorker;

/// Configuration for a [`Sandbox`]
///
/// # Examples
///
/// ```
/// let opts = rflayout::SandboxOptions::default();
/// assert_eq!(opts.session_epoch.as_secs(), 3600);
/// ```
#[derive(Debug, Clone)]
pub struct SandboxOptions {
    /// Virtual time every session starts at; engine animation math needs it
    /// well above zero
    pub session_epoch: Duration,
    /// Callbacks one clock drain may execute before it is treated as runaway
    /// scheduling
    pub max_drain_iterations: usize,
    /// System properties layered over the platform's `build.prop`
    pub property_overrides: BTreeMap<String, String>,
}

impl Default for SandboxOptions {
    fn default() -> Self {
        Self {
            session_epoch: Duration::from_secs(60 * 60),
            max_drain_iterations: VirtualClock::DEFAULT_MAX_DRAIN_ITERATIONS,
            property_overrides: BTreeMap::new(),
        }
    }
}
