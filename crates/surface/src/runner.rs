//! Surface runner - owns a [`Surface`] on a dedicated tick thread.
//!
//! Batches, target changes and timer expiries are all handled on that one
//! thread, so no tick ever overlaps another tick or a timer callback.

use crate::error::{Result, SurfaceError};
use crate::surface::Surface;
use crossbeam_channel::{RecvTimeoutError, Sender};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tactus_contacts::ContactBatch;
use tactus_recognition::RecognitionRegistry;
use tactus_targets::{Target, TargetId};

/// Longest the runner sleeps without input or a pending timer.
pub const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Input accepted by the tick thread.
pub enum SurfaceInput {
    Batch(ContactBatch),
    AddTarget(TargetId, Arc<dyn Target>),
    RemoveTarget(TargetId),
    Shutdown,
}

impl std::fmt::Debug for SurfaceInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Batch(batch) => f.debug_tuple("Batch").field(batch).finish(),
            Self::AddTarget(id, _) => f.debug_tuple("AddTarget").field(id).finish(),
            Self::RemoveTarget(id) => f.debug_tuple("RemoveTarget").field(id).finish(),
            Self::Shutdown => f.write_str("Shutdown"),
        }
    }
}

/// Time source used to expire recognizer timers between batches.
///
/// Must use the same time base as the transport's batch timestamps.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

/// Milliseconds since the clock was created.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(now_ms: u64) -> Self {
        Self {
            now: AtomicU64::new(now_ms),
        }
    }

    pub fn set(&self, now_ms: u64) {
        self.now.store(now_ms, Ordering::SeqCst);
    }

    pub fn advance(&self, delta_ms: u64) {
        self.now.fetch_add(delta_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Handle to a surface running on its own thread.
pub struct SurfaceRunner {
    sender: Sender<SurfaceInput>,
    registry: Arc<RecognitionRegistry>,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<Surface>>,
}

impl SurfaceRunner {
    /// Move `surface` onto a new tick thread.
    pub fn spawn(surface: Surface, clock: Arc<dyn Clock>) -> Result<Self> {
        let (sender, receiver) = crossbeam_channel::unbounded::<SurfaceInput>();
        let registry = Arc::clone(surface.registry());
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);

        let handle = std::thread::Builder::new()
            .name("tactus-surface".into())
            .spawn(move || {
                let mut surface = surface;
                tracing::info!(now_ms = clock.now_ms(), "Surface runner started");

                // Runs until Shutdown so input queued before it is still ticked.
                loop {
                    let timeout = match surface.next_deadline() {
                        Some(deadline) => Duration::from_millis(
                            deadline.saturating_sub(clock.now_ms()),
                        )
                        .min(IDLE_POLL_INTERVAL),
                        None => IDLE_POLL_INTERVAL,
                    };

                    match receiver.recv_timeout(timeout) {
                        Ok(SurfaceInput::Batch(batch)) => {
                            if let Err(e) = surface.refresh(&batch) {
                                tracing::error!(error = %e, "Surface refresh failed, stopping runner");
                                break;
                            }
                        }
                        Ok(SurfaceInput::AddTarget(id, target)) => {
                            surface.insert_target(id, target);
                        }
                        Ok(SurfaceInput::RemoveTarget(id)) => {
                            surface.remove_target(id);
                        }
                        Ok(SurfaceInput::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
                        Err(RecvTimeoutError::Timeout) => {
                            surface.advance_to(clock.now_ms());
                        }
                    }
                }

                flag.store(false, Ordering::SeqCst);
                tracing::info!(now_ms = surface.now_ms(), "Surface runner stopped");
                surface
            })
            .map_err(SurfaceError::Spawn)?;

        Ok(Self {
            sender,
            registry,
            running,
            handle: Some(handle),
        })
    }

    /// Queue a transport batch.
    pub fn submit(&self, batch: ContactBatch) -> Result<()> {
        self.send(SurfaceInput::Batch(batch))
    }

    /// Queue a new target; the id is usable for registrations right away.
    pub fn add_target(&self, target: Arc<dyn Target>) -> Result<TargetId> {
        let id = TargetId::next();
        self.send(SurfaceInput::AddTarget(id, target))?;
        Ok(id)
    }

    pub fn remove_target(&self, id: TargetId) -> Result<()> {
        self.send(SurfaceInput::RemoveTarget(id))
    }

    /// Raw input sender, for transports that feed the runner directly.
    pub fn sender(&self) -> Sender<SurfaceInput> {
        self.sender.clone()
    }

    pub fn registry(&self) -> &Arc<RecognitionRegistry> {
        &self.registry
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Stop the tick thread and hand back its surface.
    pub fn stop(&mut self) -> Option<Surface> {
        let handle = self.handle.take()?;
        self.running.store(false, Ordering::SeqCst);
        let _ = self.sender.send(SurfaceInput::Shutdown);
        match handle.join() {
            Ok(surface) => Some(surface),
            Err(_) => {
                tracing::error!("Surface runner thread panicked");
                None
            }
        }
    }

    fn send(&self, input: SurfaceInput) -> Result<()> {
        if !self.is_running() {
            return Err(SurfaceError::RunnerStopped);
        }
        self.sender
            .send(input)
            .map_err(|_| SurfaceError::RunnerStopped)
    }
}

impl Drop for SurfaceRunner {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for SurfaceRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SurfaceRunner")
            .field("running", &self.is_running())
            .field("queued", &self.sender.len())
            .finish_non_exhaustive()
    }
}
