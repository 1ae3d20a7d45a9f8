//! In-memory input source and sink
//!
//! `VirtualSource` lets a caller inject raw events as if a global hook had fired.
//! `VirtualSink` keeps a log of every synthesized call and a virtual cursor.
//! `mr play --dry-run` and the crate's tests both run on these.

use super::{InputSink, InputSource, RawEvent, RawInput};
use crate::error::{Error, Result};
use crate::events::{MouseButton, Press};
use crossbeam_channel::Sender;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

#[derive(Default)]
struct SourceState {
    subscriber: Option<Sender<RawEvent>>,
    cursor: (i32, i32),
    unavailable: Option<String>,
}

/// Input source driven by the caller
#[derive(Clone, Default)]
pub struct VirtualSource {
    state: Arc<Mutex<SourceState>>,
}

impl VirtualSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// A source whose `subscribe` always fails, like a hook denied by the OS
    pub fn unavailable(reason: impl Into<String>) -> Self {
        let source = Self::default();
        source.state.lock().unavailable = Some(reason.into());
        source
    }

    pub fn is_subscribed(&self) -> bool {
        self.state.lock().subscriber.is_some()
    }

    pub fn set_cursor(&self, x: i32, y: i32) {
        self.state.lock().cursor = (x, y);
    }

    /// Deliver a raw event. Returns false when nobody is subscribed.
    ///
    /// Button events are stamped with the cursor at the time of the call,
    /// the way the native hook stamps them.
    pub fn emit(&self, mut input: RawInput) -> bool {
        let mut state = self.state.lock();
        match &mut input {
            RawInput::Motion { x, y } => state.cursor = (*x as i32, *y as i32),
            RawInput::Button { position, .. } => *position = state.cursor,
            _ => {}
        }
        match &state.subscriber {
            Some(tx) => tx.send(RawEvent::now(input)).is_ok(),
            None => false,
        }
    }

    /// Button edge at the current cursor
    pub fn button(&self, press: Press, button: MouseButton) -> bool {
        self.emit(RawInput::Button { press, button, position: (0, 0) })
    }

    pub fn click(&self, button: MouseButton) {
        self.button(Press::Down, button.clone());
        self.button(Press::Up, button);
    }

    pub fn tap(&self, key: &str) {
        self.emit(RawInput::Key { press: Press::Down, key: key.to_string() });
        self.emit(RawInput::Key { press: Press::Up, key: key.to_string() });
    }
}

impl InputSource for VirtualSource {
    fn subscribe(&self, tx: Sender<RawEvent>) -> Result<()> {
        let mut state = self.state.lock();
        if let Some(reason) = &state.unavailable {
            return Err(Error::input_unavailable(reason.clone()));
        }
        state.subscriber = Some(tx);
        Ok(())
    }

    fn unsubscribe(&self) {
        self.state.lock().subscriber = None;
    }

    fn cursor_position(&self) -> (i32, i32) {
        self.state.lock().cursor
    }
}

/// One synthesized input call
#[derive(Debug, Clone, PartialEq)]
pub enum SinkCall {
    MoveTo(i32, i32),
    PressButton(MouseButton),
    ReleaseButton(MouseButton),
    PressKey(String),
    ReleaseKey(String),
}

#[derive(Default)]
struct SinkState {
    calls: Vec<(Instant, SinkCall)>,
    cursor: (i32, i32),
    failing_keys: HashSet<String>,
}

/// Input sink that records what it was asked to do
#[derive(Clone, Default)]
pub struct VirtualSink {
    state: Arc<Mutex<SinkState>>,
    echo: bool,
}

impl VirtualSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Print each call to stdout as it happens
    pub fn echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    /// Make press/release of `key` fail, to exercise synthesis errors
    pub fn fail_key(self, key: impl Into<String>) -> Self {
        self.state.lock().failing_keys.insert(key.into());
        self
    }

    pub fn calls(&self) -> Vec<SinkCall> {
        self.state.lock().calls.iter().map(|(_, c)| c.clone()).collect()
    }

    pub fn timed_calls(&self) -> Vec<(Instant, SinkCall)> {
        self.state.lock().calls.clone()
    }

    pub fn cursor(&self) -> (i32, i32) {
        self.state.lock().cursor
    }

    fn record(&self, call: SinkCall) -> Result<()> {
        let mut state = self.state.lock();
        if let SinkCall::PressKey(k) | SinkCall::ReleaseKey(k) = &call {
            if state.failing_keys.contains(k) {
                return Err(Error::action_failed(
                    &format!("{:?}", call),
                    "key is not synthesizable",
                ));
            }
        }
        if let SinkCall::MoveTo(x, y) = call {
            state.cursor = (x, y);
        }
        if self.echo {
            println!("{:?}", call);
        }
        state.calls.push((Instant::now(), call));
        Ok(())
    }
}

impl InputSink for VirtualSink {
    fn move_to(&mut self, x: i32, y: i32) -> Result<()> {
        self.record(SinkCall::MoveTo(x, y))
    }

    fn press_button(&mut self, button: &MouseButton) -> Result<()> {
        self.record(SinkCall::PressButton(button.clone()))
    }

    fn release_button(&mut self, button: &MouseButton) -> Result<()> {
        self.record(SinkCall::ReleaseButton(button.clone()))
    }

    fn press_key(&mut self, key: &str) -> Result<()> {
        self.record(SinkCall::PressKey(key.to_string()))
    }

    fn release_key(&mut self, key: &str) -> Result<()> {
        self.record(SinkCall::ReleaseKey(key.to_string()))
    }
}
