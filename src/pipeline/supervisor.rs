//! Sole owner of the renderer process lifecycle.
//!
//! At most one renderer runs at any time; replacing it stops the old
//! process first (graceful signal, bounded wait, escalation). A short
//! blank gap on the output during the handover is expected behavior.

use super::RenderSpec;
use anyhow::{Context, Result};
use std::io;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(10);
/// Pause between stopping a renderer and starting the next one so the
/// capture devices are fully released before they are reopened.
const RESTART_SETTLE: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Health {
    Alive,
    Dead,
}

/// Ownership wrapper around one running renderer process. Only the
/// supervisor holds one; nobody else signals or waits on the child.
pub struct RendererHandle {
    child: Child,
    label: String,
    grace: Duration,
}

impl RendererHandle {
    fn pid(&self) -> i32 {
        self.child.id() as i32
    }

    fn has_exited(&mut self) -> bool {
        !matches!(self.child.try_wait(), Ok(None))
    }

    /// Graceful stop: SIGTERM, bounded wait, then SIGKILL and reap.
    fn shutdown(&mut self) {
        if self.has_exited() {
            return;
        }
        // SAFETY: the pid belongs to a child owned by this handle.
        if unsafe { libc::kill(self.pid(), libc::SIGTERM) } != 0 {
            debug!(
                label = %self.label,
                "SIGTERM to renderer failed: {}",
                io::Error::last_os_error()
            );
        }
        if !self.wait_for_exit(self.grace) {
            warn!(label = %self.label, "renderer ignored SIGTERM, escalating to SIGKILL");
            // SAFETY: same owned child pid as above.
            if unsafe { libc::kill(self.pid(), libc::SIGKILL) } != 0 {
                debug!(
                    label = %self.label,
                    "SIGKILL to renderer failed: {}",
                    io::Error::last_os_error()
                );
            }
            let _ = self.child.wait();
        }
    }

    fn wait_for_exit(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            match self.child.try_wait() {
                Ok(Some(_)) => return true,
                Ok(None) => {}
                // The child can no longer be observed; treat it as gone.
                Err(_) => return true,
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(EXIT_POLL_INTERVAL);
        }
    }
}

impl Drop for RendererHandle {
    /// Backstop: a handle leaving scope on any path, panics included,
    /// still releases the process.
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Starts, replaces, and stops the renderer; tracks its health.
pub struct PipelineSupervisor {
    renderer_cmd: String,
    stop_grace: Duration,
    handle: Option<RendererHandle>,
}

impl PipelineSupervisor {
    pub fn new(renderer_cmd: String, stop_grace: Duration) -> Self {
        Self {
            renderer_cmd,
            stop_grace,
            handle: None,
        }
    }

    /// Bring up a renderer for `spec`, stopping any current one first.
    ///
    /// A start failure is recoverable: the supervisor ends up with no
    /// renderer and the caller retries on a later tick.
    pub fn apply(&mut self, spec: &RenderSpec) -> Result<()> {
        let had_renderer = self.handle.is_some();
        self.stop();
        if had_renderer {
            thread::sleep(RESTART_SETTLE);
        }
        self.start(spec.renderer_args(), &spec.label, spec.source)
    }

    fn start(&mut self, args: Vec<String>, label: &str, source: usize) -> Result<()> {
        let child = Command::new(&self.renderer_cmd)
            .args(&args)
            .stdin(Stdio::null())
            .spawn()
            .with_context(|| {
                format!(
                    "failed to start renderer '{}' for {label}",
                    self.renderer_cmd
                )
            })?;
        info!(source, label, pid = child.id(), "renderer started");
        self.handle = Some(RendererHandle {
            child,
            label: label.to_string(),
            grace: self.stop_grace,
        });
        Ok(())
    }

    /// Non-blocking liveness check; a dead renderer is reaped and the
    /// handle cleared so the caller can re-apply.
    pub fn healthcheck(&mut self) -> Health {
        let Some(handle) = self.handle.as_mut() else {
            return Health::Dead;
        };
        match handle.child.try_wait() {
            Ok(None) => Health::Alive,
            Ok(Some(status)) => {
                warn!(label = %handle.label, %status, "renderer exited unexpectedly");
                self.handle = None;
                Health::Dead
            }
            Err(err) => {
                warn!(label = %handle.label, %err, "renderer health check failed");
                self.handle = None;
                Health::Dead
            }
        }
    }

    /// Stop the current renderer, if any. Idempotent.
    pub fn stop(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            handle.shutdown();
            info!(label = %handle.label, "renderer stopped");
        }
    }

    pub fn has_renderer(&self) -> bool {
        self.handle.is_some()
    }
}
