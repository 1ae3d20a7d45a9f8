//! Macro recorder
//!
//! The input source pushes raw events into a bounded queue from its hook
//! thread. A worker thread owned by the [`RecordingHandle`] filters them,
//! stamps each with its offset from the recording start, appends it to the
//! macro and forwards it to listeners.

use crate::error::{Error, Result};
use crate::events::{Action, Macro};
use crate::platform::{InputSource, RawEvent, RawInput};
pub use crossbeam_channel::{Receiver, Sender};
use crossbeam_channel::{bounded, unbounded, RecvTimeoutError};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Recorder configuration
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    /// Raw events buffered between the hook and the worker
    pub queue_capacity: usize,
    /// How often the worker checks for stop while the queue is idle
    pub poll_interval_ms: u64,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 10000,
            poll_interval_ms: 50,
        }
    }
}

/// Recording handle - owns one recording session
pub struct RecordingHandle {
    stop: Arc<AtomicBool>,
    active: Arc<AtomicBool>,
    source: Arc<dyn InputSource>,
    actions: Arc<Mutex<Macro>>,
    events_rx: Receiver<Action>,
    worker: Option<thread::JoinHandle<()>>,
}

impl RecordingHandle {
    /// Unsubscribe, process whatever is still queued and return the recording
    pub fn stop(mut self) -> Macro {
        self.shutdown();
        let recorded = std::mem::take(&mut *self.actions.lock());
        info!(actions = recorded.len(), "recording stopped");
        recorded
    }

    fn shutdown(&mut self) {
        self.source.unsubscribe();
        self.stop.store(true, Ordering::SeqCst);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        self.active.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        !self.stop.load(Ordering::Relaxed)
    }

    /// Number of actions recorded so far
    pub fn len(&self) -> usize {
        self.actions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the actions recorded so far
    pub fn snapshot(&self) -> Macro {
        self.actions.lock().clone()
    }

    /// Live stream of actions as they are recorded
    pub fn receiver(&self) -> &Receiver<Action> {
        &self.events_rx
    }

    pub fn try_recv(&self) -> Option<Action> {
        self.events_rx.try_recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<Action> {
        self.events_rx.recv_timeout(timeout).ok()
    }
}

impl Drop for RecordingHandle {
    fn drop(&mut self) {
        if self.worker.is_some() {
            self.shutdown();
        }
    }
}

/// The recorder
pub struct MacroRecorder {
    config: RecorderConfig,
    source: Arc<dyn InputSource>,
    active: Arc<AtomicBool>,
}

impl MacroRecorder {
    pub fn new(source: Arc<dyn InputSource>) -> Self {
        Self::with_config(source, RecorderConfig::default())
    }

    pub fn with_config(source: Arc<dyn InputSource>, config: RecorderConfig) -> Self {
        Self {
            config,
            source,
            active: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Start a recording session.
    ///
    /// Fails with `AlreadyActive` while a previous handle is alive, and with
    /// `InputUnavailable` when the source refuses the subscription.
    pub fn start(&self) -> Result<RecordingHandle> {
        if self
            .active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(Error::already_active("recorder"));
        }

        let (raw_tx, raw_rx) = bounded::<RawEvent>(self.config.queue_capacity.max(1));
        let start = Instant::now();

        if let Err(e) = self.source.subscribe(raw_tx) {
            self.active.store(false, Ordering::SeqCst);
            return Err(e);
        }

        let (events_tx, events_rx) = unbounded::<Action>();
        let stop = Arc::new(AtomicBool::new(false));
        let actions = Arc::new(Mutex::new(Macro::new()));

        let worker = {
            let stop = stop.clone();
            let actions = actions.clone();
            let poll = Duration::from_millis(self.config.poll_interval_ms.max(1));
            thread::Builder::new()
                .name("mr-recorder".into())
                .spawn(move || run_worker(raw_rx, events_tx, actions, stop, start, poll))
        };
        let worker = match worker {
            Ok(w) => w,
            Err(e) => {
                self.source.unsubscribe();
                self.active.store(false, Ordering::SeqCst);
                return Err(e.into());
            }
        };

        info!("recording started");
        Ok(RecordingHandle {
            stop,
            active: self.active.clone(),
            source: self.source.clone(),
            actions,
            events_rx,
            worker: Some(worker),
        })
    }
}

fn run_worker(
    raw_rx: Receiver<RawEvent>,
    events_tx: Sender<Action>,
    actions: Arc<Mutex<Macro>>,
    stop: Arc<AtomicBool>,
    start: Instant,
    poll: Duration,
) {
    let handle = |raw: RawEvent| {
        if let Some(action) = to_action(raw, start) {
            debug!(%action, "recorded");
            actions.lock().push(action.clone());
            let _ = events_tx.send(action);
        }
    };

    while !stop.load(Ordering::Relaxed) {
        match raw_rx.recv_timeout(poll) {
            Ok(raw) => handle(raw),
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    // Events delivered before unsubscribe still belong to this recording
    for raw in raw_rx.try_iter() {
        handle(raw);
    }
}

/// Convert a raw event into an action. Motion and wheel events are dropped.
fn to_action(raw: RawEvent, start: Instant) -> Option<Action> {
    let timestamp = raw.at.saturating_duration_since(start).as_secs_f64();
    match raw.input {
        RawInput::Button {
            press,
            button,
            position,
        } => Some(Action::mouse(press, button, position, timestamp)),
        RawInput::Key { press, key } => Some(Action::key(press, key, timestamp)),
        RawInput::Motion { .. } | RawInput::Wheel { .. } => None,
    }
}
