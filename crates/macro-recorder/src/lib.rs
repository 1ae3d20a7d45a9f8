//! macro-recorder - record mouse clicks and key presses, replay them later
//!
//! A [`MacroRecorder`] turns global input events into timestamped [`Action`]s.
//! A [`Player`] replays a [`Macro`] with the same relative timing. A
//! [`Session`] ties both to one current macro and keeps them from running at
//! the same time.
//!
//! ## Platform Support
//!
//! - **macOS / Windows**: global hooks and synthesis via rdev (`native` feature)
//! - **Linux**: rdev over X11, opt in with the `native` feature
//! - Anywhere: [`platform::virtual_input`] for dry runs and tests

pub mod error;
pub mod events;
pub mod platform;
pub mod recorder;
pub mod replay;
pub mod session;
pub mod storage;

pub use error::{Error, ErrorCode, Result};
pub use events::*;
pub use recorder::{MacroRecorder, Receiver, RecorderConfig, RecordingHandle, Sender};
pub use replay::{FailurePolicy, PlaybackReport, Player, PlayerConfig, Progress, StopHandle};
pub use session::{Mode, Session};
pub use storage::MacroStorage;

pub mod prelude {
    pub use crate::error::{Error, ErrorCode, Result};
    pub use crate::events::*;
    pub use crate::platform::{InputSink, InputSource};
    pub use crate::recorder::{MacroRecorder, RecorderConfig, RecordingHandle};
    pub use crate::replay::{FailurePolicy, PlaybackReport, Player, PlayerConfig, Progress};
    pub use crate::session::{Mode, Session};
    pub use crate::storage::MacroStorage;
}
