//! The render sandbox: one engine handle driven through inflate, mutate,
//! and render on virtual time.
//!
//! Every session that gets created is released exactly once, whichever step
//! fails and even if caller code panics.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};

use crate::capture::RenderData;
use crate::clock::VirtualClock;
use crate::engine::{EngineFault, FaultKind, RenderEngine, RenderSession, ViewFactory};
use crate::environment::EnvironmentContext;
use crate::error::RenderStep;
use crate::session::{SessionConfig, SessionConfigBuilder};
use crate::{Error, Result, SandboxOptions};

/// Per-call render options.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderOptions {
    /// Draw layout bounds overlays
    pub show_layout_bounds: bool,
    /// Virtual times, relative to the session epoch, at which frames are
    /// rendered. Must be non-decreasing; the capture reflects the last one.
    pub frame_offsets: Vec<Duration>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            show_layout_bounds: true,
            frame_offsets: vec![Duration::ZERO],
        }
    }
}

impl RenderOptions {
    /// Check the offsets and convert them to nanoseconds after `epoch`.
    fn frame_times(&self, epoch: u64) -> Result<Vec<u64>> {
        if self.frame_offsets.is_empty() {
            return Err(Error::ConfigurationError("at least one frame offset is required".into()));
        }
        if let Some(pair) = self.frame_offsets.windows(2).find(|w| w[1] < w[0]) {
            return Err(Error::ConfigurationError(format!(
                "frame offsets must be non-decreasing: {:?} follows {:?}",
                pair[1], pair[0]
            )));
        }
        self.frame_offsets
            .iter()
            .map(|offset| {
                let nanos = duration_nanos(*offset, "frame offset")?;
                match epoch.checked_add(nanos) {
                    Some(_) => Ok(nanos),
                    None => Err(Error::ConfigurationError(format!(
                        "frame offset {:?} overflows virtual time past the session epoch",
                        offset
                    ))),
                }
            })
            .collect()
    }
}

/// `d` in nanoseconds, or a configuration error if it does not fit in a u64.
fn duration_nanos(d: Duration, what: &str) -> Result<u64> {
    u64::try_from(d.as_nanos())
        .map_err(|_| Error::ConfigurationError(format!("{} {:?} exceeds the virtual clock range", what, d)))
}

/// Owns an initialized engine for one environment.
///
/// Not `Sync`: render calls are serialized through `&mut self`. Use
/// [`crate::worker::SandboxWorker`] to drive a sandbox from async code.
pub struct Sandbox<E: RenderEngine> {
    environment: EnvironmentContext,
    engine: E,
    clock: VirtualClock,
    compat: Option<Arc<dyn ViewFactory>>,
    epoch: u64,
    disposed: bool,
}

impl<E: RenderEngine> Sandbox<E> {
    pub fn new(environment: &EnvironmentContext, engine: E) -> Result<Self> {
        Self::with_options(environment, engine, SandboxOptions::default())
    }

    /// Initialize `engine` against `environment`.
    ///
    /// Fails with [`Error::EngineInitFault`] when the engine refuses to start.
    pub fn with_options(environment: &EnvironmentContext, mut engine: E, options: SandboxOptions) -> Result<Self> {
        let epoch = duration_nanos(options.session_epoch, "session epoch")?;
        let mut properties = environment.engine_properties()?;
        properties.system_properties.extend(options.property_overrides);
        let asset_paths = environment.asset_resolver().existing_dirs();
        engine
            .init(&properties, &asset_paths)
            .map_err(|fault| Error::EngineInitFault(fault.message))?;

        let compat = engine.probe_compat_layer();
        match &compat {
            Some(factory) => debug!("Compatibility view factory '{}' available", factory.id()),
            None => debug!("No compatibility view factory; inflating with engine defaults"),
        }
        info!(
            "Engine initialized for {} (platform sdk {})",
            environment.app_dir.display(),
            properties.platform_sdk_version
        );

        Ok(Self {
            environment: environment.clone(),
            engine,
            clock: VirtualClock::new(options.max_drain_iterations),
            compat,
            epoch,
            disposed: false,
        })
    }

    pub fn environment(&self) -> &EnvironmentContext {
        &self.environment
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn clock(&self) -> &VirtualClock {
        &self.clock
    }

    pub fn has_compat_layer(&self) -> bool {
        self.compat.is_some()
    }

    /// A configuration builder over this sandbox's environment.
    pub fn session_builder(&self) -> SessionConfigBuilder {
        SessionConfigBuilder::from(&self.environment)
    }

    /// Render `config` without mutation, using default options.
    pub fn render(&mut self, config: &SessionConfig) -> Result<RenderData> {
        self.render_with(config, &RenderOptions::default(), |_| Ok(()))
    }

    /// Inflate `config`'s layout, hand the live tree to `mutate`, render the
    /// requested frames and capture the result.
    pub fn render_with<F>(&mut self, config: &SessionConfig, options: &RenderOptions, mutate: F) -> Result<RenderData>
    where
        F: FnOnce(&mut <E::Session as RenderSession>::Root) -> anyhow::Result<()>,
    {
        if self.disposed {
            return Err(Error::UseAfterDispose);
        }
        let frame_times = options.frame_times(self.epoch)?;

        let mut session = self
            .engine
            .create_session(config)
            .map_err(|fault| step_error(RenderStep::Create, fault, config.timeout))?;
        session.set_elapsed_time(0);
        session.set_first_frame_executed(true);
        self.engine.prepare_thread();

        let mut guard = SessionGuard {
            engine: &mut self.engine,
            clock: &mut self.clock,
            session,
            released: false,
        };
        let result = drive(&mut guard, self.compat.as_ref(), self.epoch, &frame_times, config, options, mutate);
        guard.release();

        match &result {
            Ok(data) => debug!(
                "Rendered {}x{} with {} root view(s)",
                data.image.width,
                data.image.height,
                data.root_views.len()
            ),
            Err(err) => warn!("Render failed: {}", err),
        }
        result
    }

    /// Release engine-wide resources. Later calls fail with
    /// [`Error::UseAfterDispose`].
    pub fn dispose(&mut self) -> Result<()> {
        if self.disposed {
            return Err(Error::UseAfterDispose);
        }
        self.disposed = true;
        self.engine.dispose();
        info!("Engine disposed");
        Ok(())
    }

    pub fn close(mut self) -> Result<()> {
        self.dispose()
    }
}

impl<E: RenderEngine> Drop for Sandbox<E> {
    fn drop(&mut self) {
        if !self.disposed {
            self.disposed = true;
            self.engine.dispose();
        }
    }
}

/// Releases the session and unbinds the thread exactly once.
struct SessionGuard<'a, E: RenderEngine> {
    engine: &'a mut E,
    clock: &'a mut VirtualClock,
    session: E::Session,
    released: bool,
}

impl<E: RenderEngine> SessionGuard<'_, E> {
    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.session.release();
        self.engine.cleanup_thread();
        // Pending callbacks may hold session state.
        let now = self.clock.now();
        self.clock.reset(now);
    }
}

impl<E: RenderEngine> Drop for SessionGuard<'_, E> {
    fn drop(&mut self) {
        self.release();
    }
}

fn drive<E, F>(
    guard: &mut SessionGuard<'_, E>,
    compat: Option<&Arc<dyn ViewFactory>>,
    epoch: u64,
    frame_times: &[u64],
    config: &SessionConfig,
    options: &RenderOptions,
    mutate: F,
) -> Result<RenderData>
where
    E: RenderEngine,
    F: FnOnce(&mut <E::Session as RenderSession>::Root) -> anyhow::Result<()>,
{
    let session = &mut guard.session;
    let clock = &mut *guard.clock;

    clock.reset(epoch);
    session
        .init(config.timeout)
        .map_err(|fault| step_error(RenderStep::Init, fault, config.timeout))?;

    if let Some(factory) = compat {
        install_view_factory(session, factory)?;
    }

    session
        .inflate(clock)
        .map_err(|fault| step_error(RenderStep::Inflate, fault, config.timeout))?;
    // Warm-up tick so work posted during inflation runs before mutation.
    advance(session, clock, epoch, config)?;

    let root = session
        .root_mut()
        .ok_or_else(|| Error::render_fault(RenderStep::Inflate, "inflation produced no root view"))?;
    match panic::catch_unwind(AssertUnwindSafe(|| mutate(root))) {
        Ok(Ok(())) => {}
        Ok(Err(err)) => return Err(Error::render_fault(RenderStep::Mutate, format!("{:#}", err))),
        Err(payload) => return Err(Error::render_fault(RenderStep::Mutate, panic_message(payload.as_ref()))),
    }

    session.set_showing_layout_bounds(options.show_layout_bounds);

    for (frame, &offset) in frame_times.iter().enumerate() {
        advance(session, clock, epoch + offset, config)?;
        session.set_elapsed_time(offset);
        session
            .render(frame == 0, clock)
            .map_err(|fault| step_error(RenderStep::Render, fault, config.timeout))?;
    }

    let capture = session
        .capture()
        .map_err(|fault| step_error(RenderStep::Capture, fault, config.timeout))?;
    Ok(RenderData::from_capture(capture))
}

/// Move virtual time to `t` and run everything due, clock callbacks first.
fn advance<S: RenderSession>(session: &mut S, clock: &mut VirtualClock, t: u64, config: &SessionConfig) -> Result<()> {
    clock.set(t);
    let executed = clock.drain(t)?;
    if executed > 0 {
        debug!("Drained {} clock callback(s) at {}ns", executed, t);
    }
    session
        .drain_scheduled_callbacks(t)
        .map_err(|fault| step_error(RenderStep::Frame, fault, config.timeout))
}

fn install_view_factory<S: RenderSession>(session: &mut S, factory: &Arc<dyn ViewFactory>) -> Result<()> {
    match session.installed_view_factory() {
        None => {
            session.install_view_factory(factory.clone());
            debug!("Installed view factory '{}'", factory.id());
            Ok(())
        }
        Some(id) if id == factory.id() => Ok(()),
        Some(id) => Err(Error::StateConflict(format!(
            "inflater already carries view factory '{}', cannot install '{}'",
            id,
            factory.id()
        ))),
    }
}

fn step_error(step: RenderStep, fault: EngineFault, timeout: Duration) -> Error {
    match fault.kind {
        FaultKind::Timeout => Error::TimedOut {
            step,
            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        },
        FaultKind::Error => Error::render_fault(step, fault.message),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("mutation panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("mutation panicked: {}", s)
    } else {
        "mutation panicked".to_string()
    }
}
