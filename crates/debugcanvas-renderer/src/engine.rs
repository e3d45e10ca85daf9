//! The asynchronous render engine.
//!
//! Three parties cooperate:
//!
//! - callers of [`RenderEngine::request_render`], which only post a message;
//! - the scheduler thread, which owns the [`Scheduler`] state machine, the
//!   retry timer (a `recv_timeout` deadline), and the [`DisplaySink`];
//! - the worker thread, which owns the [`FrameRenderer`] and runs at most
//!   one pass at a time.
//!
//! The sink is invoked on the scheduler thread. Marshaling frames onto a UI
//! thread is the sink's job.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use debugcanvas_core::SharedDrawingData;
use parking_lot::Mutex;
use uuid::Uuid;

use crate::buffer::Frame;
use crate::config::EngineConfig;
use crate::error::RenderError;
use crate::raster::{CancelToken, FrameRenderer, PassRequest, Rasterizer};
use crate::scheduler::{Decision, EngineState, Scheduler};
use crate::viewport::pixel_dimension;

/// Receives every frame produced by a completed, non-cancelled pass.
pub trait DisplaySink: Send + 'static {
    fn publish(&mut self, frame: Frame);
}

impl<F> DisplaySink for F
where
    F: FnMut(Frame) + Send + 'static,
{
    fn publish(&mut self, frame: Frame) {
        self(frame)
    }
}

/// The latest render request, replayed when a retry fires.
#[derive(Clone)]
struct PendingRequest {
    width: u32,
    height: u32,
    source: SharedDrawingData,
}

struct Job {
    request: PassRequest,
    cancel: CancelToken,
}

enum Control {
    Request(PendingRequest),
    Completed(Result<Frame, RenderError>),
    Shutdown,
}

/// Handle to a running engine. Dropping it shuts the engine down.
pub struct RenderEngine {
    id: Uuid,
    control: Sender<Control>,
    state: Arc<Mutex<EngineState>>,
    scheduler_thread: Option<JoinHandle<()>>,
    worker_thread: Option<JoinHandle<()>>,
}

impl RenderEngine {
    /// Start an engine backed by the tiny-skia [`Rasterizer`].
    pub fn spawn<S: DisplaySink>(config: EngineConfig, sink: S) -> Result<Self, RenderError> {
        let rasterizer = Rasterizer::new(config.clone());
        Self::spawn_with(config, rasterizer, sink)
    }

    /// Start an engine around any [`FrameRenderer`].
    pub fn spawn_with<R, S>(config: EngineConfig, renderer: R, sink: S) -> Result<Self, RenderError>
    where
        R: FrameRenderer,
        S: DisplaySink,
    {
        let id = Uuid::new_v4();
        let tag = id.simple().to_string()[..8].to_string();
        let (control_tx, control_rx) = mpsc::channel();
        let (job_tx, job_rx) = mpsc::channel();
        let state = Arc::new(Mutex::new(EngineState::Idle));

        let worker_thread = thread::Builder::new()
            .name(format!("debugcanvas-worker-{}", tag))
            .spawn({
                let control = control_tx.clone();
                move || run_worker(renderer, job_rx, control)
            })?;

        let coordinator = Coordinator {
            scheduler: Scheduler::new(config.debounce_window(), config.retry_delay()),
            latest: None,
            in_flight: None,
            jobs: job_tx,
            sink,
            state: Arc::clone(&state),
        };
        let scheduler_thread = match thread::Builder::new()
            .name(format!("debugcanvas-scheduler-{}", tag))
            .spawn(move || coordinator.run(control_rx))
        {
            Ok(handle) => handle,
            Err(e) => {
                // The closure owned the job sender, so the worker sees a
                // closed queue and exits on its own.
                let _ = worker_thread.join();
                return Err(e.into());
            }
        };

        log::debug!("render engine {} started", id);
        Ok(Self {
            id,
            control: control_tx,
            state,
            scheduler_thread: Some(scheduler_thread),
            worker_thread: Some(worker_thread),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> EngineState {
        *self.state.lock()
    }

    /// Ask for a frame of `width x height` pixels from `source`.
    ///
    /// Never fails and never blocks on rendering. Dimensions are rounded and
    /// clamped to at least 1.
    ///
    /// Only the `source` handle is captured here, not its contents. The deep
    /// snapshot is taken on the scheduler thread when a pass is dispatched,
    /// so commands appended after this call but before dispatch are included,
    /// and a coalesced or retried request renders the newest contents. Take a
    /// [`SharedDrawingData::snapshot`] into a fresh handle first to pin the
    /// contents as of the request.
    pub fn request_render(&self, width: f64, height: f64, source: &SharedDrawingData) {
        let request = PendingRequest {
            width: pixel_dimension(width),
            height: pixel_dimension(height),
            source: source.clone(),
        };
        if self.control.send(Control::Request(request)).is_err() {
            log::warn!("render engine {}: {}; request dropped", self.id, RenderError::EngineStopped);
        }
    }

    /// Stop both threads and wait for them. An in-flight pass is cancelled
    /// and its result discarded. Calling this twice is harmless.
    pub fn shutdown(&mut self) {
        let Some(scheduler) = self.scheduler_thread.take() else {
            return;
        };
        let _ = self.control.send(Control::Shutdown);
        if scheduler.join().is_err() {
            log::error!("render engine {}: scheduler thread panicked", self.id);
        }
        if let Some(worker) = self.worker_thread.take() {
            if worker.join().is_err() {
                log::error!("render engine {}: worker thread panicked", self.id);
            }
        }
        *self.state.lock() = EngineState::Idle;
        log::debug!("render engine {} stopped", self.id);
    }
}

impl Drop for RenderEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// State owned by the scheduler thread.
struct Coordinator<S> {
    scheduler: Scheduler,
    latest: Option<PendingRequest>,
    /// Cancel token of the pass the worker is running.
    in_flight: Option<CancelToken>,
    jobs: Sender<Job>,
    sink: S,
    state: Arc<Mutex<EngineState>>,
}

impl<S: DisplaySink> Coordinator<S> {
    fn run(mut self, control: Receiver<Control>) {
        loop {
            let message = match self.scheduler.retry_at() {
                Some(at) => {
                    let wait = at.saturating_duration_since(Instant::now());
                    match control.recv_timeout(wait) {
                        Ok(message) => Some(message),
                        Err(RecvTimeoutError::Timeout) => None,
                        Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                None => match control.recv() {
                    Ok(message) => Some(message),
                    Err(_) => break,
                },
            };

            match message {
                None => {
                    let decision = self.scheduler.on_timer(Instant::now());
                    self.apply(decision);
                }
                Some(Control::Request(request)) => {
                    self.latest = Some(request);
                    let decision = self.scheduler.on_request(Instant::now());
                    self.apply(decision);
                }
                Some(Control::Completed(outcome)) => {
                    self.in_flight = None;
                    self.deliver(outcome);
                    self.scheduler.on_completed();
                }
                Some(Control::Shutdown) => {
                    if let Some(cancel) = self.in_flight.take() {
                        cancel.cancel();
                    }
                    break;
                }
            }
            *self.state.lock() = self.scheduler.state();
        }
    }

    fn apply(&mut self, decision: Decision) {
        match decision {
            Decision::Ignore => {
                log::trace!("render request coalesced into the running pass");
            }
            Decision::CancelAndRetry { retry_at } => {
                log::debug!(
                    "pass overran; cancelling and retrying in {:?}",
                    retry_at.saturating_duration_since(Instant::now())
                );
                if let Some(cancel) = &self.in_flight {
                    cancel.cancel();
                }
            }
            Decision::Dispatch => self.dispatch(),
        }
    }

    fn dispatch(&mut self) {
        let Some(latest) = &self.latest else {
            self.scheduler.on_completed();
            return;
        };
        let request = PassRequest {
            width: latest.width,
            height: latest.height,
            data: latest.source.snapshot(),
        };
        log::debug!("dispatching {}x{} pass", request.width, request.height);

        let cancel = CancelToken::new();
        let job = Job {
            request,
            cancel: cancel.clone(),
        };
        // Visible as Busy before the worker can possibly finish.
        *self.state.lock() = self.scheduler.state();
        if self.jobs.send(job).is_err() {
            log::error!("render worker is gone; pass dropped");
            self.scheduler.on_completed();
            return;
        }
        self.in_flight = Some(cancel);
    }

    fn deliver(&mut self, outcome: Result<Frame, RenderError>) {
        match outcome {
            Ok(frame) => {
                let sink = &mut self.sink;
                let published = panic::catch_unwind(AssertUnwindSafe(|| sink.publish(frame)));
                if let Err(payload) = published {
                    log::error!("display sink panicked: {}", panic_message(payload.as_ref()));
                }
            }
            Err(RenderError::Cancelled) => {
                log::debug!("cancelled pass discarded");
            }
            Err(e) => {
                log::warn!("render pass produced no image: {}", e);
            }
        }
    }
}

fn run_worker<R: FrameRenderer>(mut renderer: R, jobs: Receiver<Job>, control: Sender<Control>) {
    while let Ok(Job { request, cancel }) = jobs.recv() {
        let started = Instant::now();
        let pass = panic::catch_unwind(AssertUnwindSafe(|| renderer.render(&request, &cancel)));
        let outcome = match pass {
            Ok(result) => result,
            Err(payload) => Err(RenderError::WorkerPanicked(panic_message(payload.as_ref()))),
        };
        if matches!(&outcome, Err(e) if !matches!(e, RenderError::Cancelled)) {
            renderer.discard();
        }
        log::trace!("pass finished in {:?}", started.elapsed());
        if control.send(Control::Completed(outcome)).is_err() {
            break;
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
