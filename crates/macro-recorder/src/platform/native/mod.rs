//! Native input via rdev
//!
//! rdev's `listen` blocks its thread forever and cannot be stopped, so a single
//! process-wide hook thread is started on first subscribe. Subscribers come and
//! go by swapping the sender the hook forwards to.

mod keys;

pub use keys::{button_from_rdev, button_to_rdev, key_from_name, key_name};

use super::{InputSink, InputSource, RawEvent, RawInput};
use crate::error::{Error, Result};
use crate::events::{MouseButton, Press};
use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use rdev::EventType;
use std::sync::{Arc, OnceLock};
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info};

/// How long to wait for rdev to report a startup failure (e.g. denied event tap)
const STARTUP_GRACE: Duration = Duration::from_millis(200);

/// Pause after each synthesized event so the OS registers it
const SETTLE: Duration = Duration::from_millis(10);

#[derive(Debug, Clone)]
enum HookState {
    Idle,
    Running,
    Failed(String),
}

struct Hub {
    subscriber: Mutex<Option<Sender<RawEvent>>>,
    cursor: Mutex<(i32, i32)>,
    hook: Mutex<HookState>,
}

impl Hub {
    fn dispatch(&self, event: rdev::Event) {
        let input = match event.event_type {
            EventType::MouseMove { x, y } => {
                *self.cursor.lock() = (x as i32, y as i32);
                RawInput::Motion { x, y }
            }
            EventType::ButtonPress(b) => RawInput::Button {
                press: Press::Down,
                button: button_from_rdev(b),
                position: *self.cursor.lock(),
            },
            EventType::ButtonRelease(b) => RawInput::Button {
                press: Press::Up,
                button: button_from_rdev(b),
                position: *self.cursor.lock(),
            },
            EventType::KeyPress(k) => RawInput::Key {
                press: Press::Down,
                key: key_name(k),
            },
            EventType::KeyRelease(k) => RawInput::Key {
                press: Press::Up,
                key: key_name(k),
            },
            EventType::Wheel { delta_x, delta_y } => RawInput::Wheel {
                dx: delta_x,
                dy: delta_y,
            },
        };

        if let Some(tx) = self.subscriber.lock().as_ref() {
            if tx.try_send(RawEvent::now(input)).is_err() {
                debug!("input queue full or closed, event dropped");
            }
        }
    }
}

/// Process-wide global input hook
#[derive(Clone)]
pub struct NativeSource {
    hub: Arc<Hub>,
}

impl NativeSource {
    pub fn shared() -> Self {
        static SHARED: OnceLock<NativeSource> = OnceLock::new();
        SHARED
            .get_or_init(|| NativeSource {
                hub: Arc::new(Hub {
                    subscriber: Mutex::new(None),
                    cursor: Mutex::new((0, 0)),
                    hook: Mutex::new(HookState::Idle),
                }),
            })
            .clone()
    }

    fn ensure_hook(&self) -> Result<()> {
        let mut state = self.hub.hook.lock();
        match &*state {
            HookState::Running => return Ok(()),
            HookState::Failed(reason) => return Err(Error::input_unavailable(reason.clone())),
            HookState::Idle => {}
        }

        let (err_tx, err_rx) = bounded::<String>(1);
        let hub = self.hub.clone();
        thread::Builder::new()
            .name("mr-input-hook".into())
            .spawn(move || {
                info!("starting global input hook");
                if let Err(e) = rdev::listen(move |event| hub.dispatch(event)) {
                    let reason = format!("global input hook failed: {:?}", e);
                    error!("{}", reason);
                    let _ = err_tx.send(reason);
                }
            })?;

        match err_rx.recv_timeout(STARTUP_GRACE) {
            Err(RecvTimeoutError::Timeout) => {
                *state = HookState::Running;
                Ok(())
            }
            Ok(reason) => {
                *state = HookState::Failed(reason.clone());
                Err(Error::input_unavailable(reason))
            }
            Err(RecvTimeoutError::Disconnected) => {
                let reason = "global input hook exited".to_string();
                *state = HookState::Failed(reason.clone());
                Err(Error::input_unavailable(reason))
            }
        }
    }
}

impl InputSource for NativeSource {
    fn subscribe(&self, tx: Sender<RawEvent>) -> Result<()> {
        self.ensure_hook()?;
        *self.hub.subscriber.lock() = Some(tx);
        Ok(())
    }

    fn unsubscribe(&self) {
        self.hub.subscriber.lock().take();
    }

    fn cursor_position(&self) -> (i32, i32) {
        *self.hub.cursor.lock()
    }
}

/// Synthesizes input with `rdev::simulate`
#[derive(Debug, Default)]
pub struct NativeSink;

impl NativeSink {
    pub fn new() -> Self {
        Self
    }

    fn send(&self, event: EventType) -> Result<()> {
        rdev::simulate(&event).map_err(|_| {
            Error::action_failed(&format!("{:?}", event), "the OS rejected the synthetic event")
        })?;
        thread::sleep(SETTLE);
        Ok(())
    }

    fn button(button: &MouseButton) -> Result<rdev::Button> {
        button_to_rdev(button).ok_or_else(|| {
            Error::action_failed(&format!("mouse button {:?}", button.to_string()), "unrecognized button name")
        })
    }

    fn key(name: &str) -> Result<rdev::Key> {
        key_from_name(name)
            .ok_or_else(|| Error::action_failed(&format!("key {:?}", name), "unrecognized key name"))
    }
}

impl InputSink for NativeSink {
    fn move_to(&mut self, x: i32, y: i32) -> Result<()> {
        self.send(EventType::MouseMove {
            x: x as f64,
            y: y as f64,
        })
    }

    fn press_button(&mut self, button: &MouseButton) -> Result<()> {
        self.send(EventType::ButtonPress(Self::button(button)?))
    }

    fn release_button(&mut self, button: &MouseButton) -> Result<()> {
        self.send(EventType::ButtonRelease(Self::button(button)?))
    }

    fn press_key(&mut self, key: &str) -> Result<()> {
        self.send(EventType::KeyPress(Self::key(key)?))
    }

    fn release_key(&mut self, key: &str) -> Result<()> {
        self.send(EventType::KeyRelease(Self::key(key)?))
    }
}
