//! Async front-end for a [`Sandbox`].
//!
//! Engines are bound to the thread that initialized them, so the worker
//! thread builds and owns the sandbox and executes commands sent from async
//! tasks. Calls are processed strictly one at a time.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread;

use log::debug;
use tokio::sync::oneshot;

use crate::capture::RenderData;
use crate::engine::{RenderEngine, RenderSession};
use crate::sandbox::{RenderOptions, Sandbox};
use crate::session::SessionConfig;
use crate::{Error, Result};

/// Caller mutation shipped to the worker thread.
pub type Mutation<R> = Box<dyn FnOnce(&mut R) -> anyhow::Result<()> + Send>;

enum Command<R> {
    Render(Box<SessionConfig>, RenderOptions, Option<Mutation<R>>, oneshot::Sender<Result<RenderData>>),
    Close(oneshot::Sender<Result<()>>),
}

/// Handle to a sandbox running on a dedicated thread. `R` is the engine's
/// live root type handed to mutations.
pub struct SandboxWorker<R> {
    cmd_tx: Sender<Command<R>>,
    closed: Arc<AtomicBool>,
}

impl<R> Clone for SandboxWorker<R> {
    fn clone(&self) -> Self {
        Self {
            cmd_tx: self.cmd_tx.clone(),
            closed: self.closed.clone(),
        }
    }
}

impl<R: 'static> SandboxWorker<R> {
    /// Spawn the worker thread and build the sandbox on it with `factory`.
    ///
    /// Resolves once the engine finished initializing, with its error if it
    /// did not.
    pub async fn spawn<E, F>(factory: F) -> Result<Self>
    where
        E: RenderEngine + 'static,
        E::Session: RenderSession<Root = R>,
        F: FnOnce() -> Result<Sandbox<E>> + Send + 'static,
    {
        let (cmd_tx, cmd_rx) = mpsc::channel::<Command<R>>();
        let (init_tx, init_rx) = oneshot::channel::<Result<()>>();
        let closed = Arc::new(AtomicBool::new(false));
        let closed_flag = closed.clone();

        thread::spawn(move || {
            let mut sandbox = match factory() {
                Ok(s) => s,
                Err(err) => {
                    let _ = init_tx.send(Err(err));
                    return;
                }
            };
            let _ = init_tx.send(Ok(()));

            while let Ok(cmd) = cmd_rx.recv() {
                match cmd {
                    Command::Render(config, options, mutation, resp) => {
                        let res = match mutation {
                            Some(mutate) => sandbox.render_with(&config, &options, mutate),
                            None => sandbox.render_with(&config, &options, |_| Ok(())),
                        };
                        let _ = resp.send(res);
                    }
                    Command::Close(resp) => {
                        let res = sandbox.dispose();
                        // Later sends from surviving handles fail immediately.
                        closed_flag.store(true, Ordering::SeqCst);
                        drop(cmd_rx);
                        let _ = resp.send(res);
                        break;
                    }
                }
            }
            debug!("Sandbox worker exiting");
        });

        init_rx
            .await
            .map_err(|e| Error::Worker(format!("worker init canceled: {}", e)))??;

        Ok(Self { cmd_tx, closed })
    }

    /// Error for a command the worker thread can no longer receive.
    fn disconnected(&self) -> Error {
        if self.closed.load(Ordering::SeqCst) {
            Error::UseAfterDispose
        } else {
            Error::Worker("worker thread stopped".into())
        }
    }

    pub async fn render(&self, config: SessionConfig, options: RenderOptions) -> Result<RenderData> {
        self.send_render(config, options, None).await
    }

    pub async fn render_with<F>(&self, config: SessionConfig, options: RenderOptions, mutate: F) -> Result<RenderData>
    where
        F: FnOnce(&mut R) -> anyhow::Result<()> + Send + 'static,
    {
        self.send_render(config, options, Some(Box::new(mutate))).await
    }

    async fn send_render(
        &self,
        config: SessionConfig,
        options: RenderOptions,
        mutation: Option<Mutation<R>>,
    ) -> Result<RenderData> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Render(Box::new(config), options, mutation, tx))
            .map_err(|_| self.disconnected())?;
        rx.await
            .map_err(|e| Error::Worker(format!("render canceled: {}", e)))?
    }

    /// Dispose the engine and stop the worker thread.
    pub async fn close(self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Close(tx))
            .map_err(|_| self.disconnected())?;
        rx.await
            .map_err(|e| Error::Worker(format!("close canceled: {}", e)))?
    }
}
