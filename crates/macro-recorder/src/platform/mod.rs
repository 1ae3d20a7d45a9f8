//! Platform abstraction layer for input capture and synthesis
//!
//! The recorder consumes an [`InputSource`], the player drives an [`InputSink`].
//! `native` wraps rdev's global hooks; `virtual_input` is an in-memory stand-in
//! used for dry runs and tests.

use crate::error::Result;
use crate::events::{MouseButton, Press};
use crossbeam_channel::Sender;
use std::sync::Arc;
use std::time::Instant;

#[cfg(feature = "native")]
pub mod native;
pub mod virtual_input;

/// Raw event delivered by an input source, before filtering
#[derive(Debug, Clone, PartialEq)]
pub enum RawInput {
    /// `position` is the cursor when the hook saw the button change
    Button {
        press: Press,
        button: MouseButton,
        position: (i32, i32),
    },
    Key { press: Press, key: String },
    Motion { x: f64, y: f64 },
    Wheel { dx: i64, dy: i64 },
}

#[derive(Debug, Clone)]
pub struct RawEvent {
    /// When the hook delivered the event
    pub at: Instant,
    pub input: RawInput,
}

impl RawEvent {
    pub fn now(input: RawInput) -> Self {
        Self {
            at: Instant::now(),
            input,
        }
    }
}

/// Global mouse and keyboard event subscription
pub trait InputSource: Send + Sync {
    /// Start delivering events to `tx`. Replaces any previous subscriber.
    fn subscribe(&self, tx: Sender<RawEvent>) -> Result<()>;

    /// Stop delivering events. Dropping the sender disconnects the receiver.
    fn unsubscribe(&self);

    /// Current pointer position in screen coordinates
    fn cursor_position(&self) -> (i32, i32);
}

/// Input synthesis
pub trait InputSink: Send {
    fn move_to(&mut self, x: i32, y: i32) -> Result<()>;
    fn press_button(&mut self, button: &MouseButton) -> Result<()>;
    fn release_button(&mut self, button: &MouseButton) -> Result<()>;
    fn press_key(&mut self, key: &str) -> Result<()>;
    fn release_key(&mut self, key: &str) -> Result<()>;
}

impl<S: InputSink + ?Sized> InputSink for Box<S> {
    fn move_to(&mut self, x: i32, y: i32) -> Result<()> {
        (**self).move_to(x, y)
    }
    fn press_button(&mut self, button: &MouseButton) -> Result<()> {
        (**self).press_button(button)
    }
    fn release_button(&mut self, button: &MouseButton) -> Result<()> {
        (**self).release_button(button)
    }
    fn press_key(&mut self, key: &str) -> Result<()> {
        (**self).press_key(key)
    }
    fn release_key(&mut self, key: &str) -> Result<()> {
        (**self).release_key(key)
    }
}

/// The native input source for this build
#[cfg(feature = "native")]
pub fn default_source() -> Result<Arc<dyn InputSource>> {
    Ok(Arc::new(native::NativeSource::shared()))
}

#[cfg(not(feature = "native"))]
pub fn default_source() -> Result<Arc<dyn InputSource>> {
    Err(crate::Error::input_unavailable(
        "this build has no native input backend",
    ))
}

/// The native input sink for this build
#[cfg(feature = "native")]
pub fn default_sink() -> Result<Box<dyn InputSink>> {
    Ok(Box::new(native::NativeSink::new()))
}

#[cfg(not(feature = "native"))]
pub fn default_sink() -> Result<Box<dyn InputSink>> {
    Err(crate::Error::input_unavailable(
        "this build has no native input backend",
    ))
}
