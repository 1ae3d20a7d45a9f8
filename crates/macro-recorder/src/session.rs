//! Control layer: the current macro plus an explicit Idle/Recording/Playing mode
//!
//! Recording and playback are mutually exclusive. Conflicting requests are
//! rejected with `Busy` instead of relying on the front end to disable them.

use crate::error::{Error, Result};
use crate::events::Macro;
use crate::platform::{InputSink, InputSource};
use crate::recorder::{MacroRecorder, RecorderConfig, RecordingHandle};
use crate::replay::{PlaybackReport, Player, PlayerConfig, Progress};
use crate::storage;
use crossbeam_channel::{unbounded, Receiver};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Idle,
    Recording,
    Playing,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Mode::Idle => "idle",
            Mode::Recording => "recording",
            Mode::Playing => "playing",
        })
    }
}

struct Playback {
    thread: thread::JoinHandle<Result<PlaybackReport>>,
    progress: Receiver<Progress>,
}

enum Activity {
    Idle,
    Recording(RecordingHandle),
    Playing(Playback),
}

pub struct Session {
    /// `None` for playback-only sessions
    recorder: Option<MacroRecorder>,
    player: Arc<Player>,
    current: Macro,
    activity: Activity,
}

impl Session {
    pub fn new(source: Arc<dyn InputSource>) -> Self {
        Self {
            recorder: Some(MacroRecorder::new(source)),
            player: Arc::new(Player::new()),
            current: Macro::new(),
            activity: Activity::Idle,
        }
    }

    pub fn with_config(
        source: Arc<dyn InputSource>,
        recorder: RecorderConfig,
        player: PlayerConfig,
    ) -> Result<Self> {
        Ok(Self {
            recorder: Some(MacroRecorder::with_config(source, recorder)),
            player: Arc::new(Player::with_config(player)?),
            current: Macro::new(),
            activity: Activity::Idle,
        })
    }

    /// A session that can load and play macros but has no input source to record from
    pub fn playback_only(player: PlayerConfig) -> Result<Self> {
        Ok(Self {
            recorder: None,
            player: Arc::new(Player::with_config(player)?),
            current: Macro::new(),
            activity: Activity::Idle,
        })
    }

    pub fn mode(&self) -> Mode {
        match self.activity {
            Activity::Idle => Mode::Idle,
            Activity::Recording(_) => Mode::Recording,
            Activity::Playing(_) => Mode::Playing,
        }
    }

    /// The current macro
    pub fn actions(&self) -> &Macro {
        &self.current
    }

    fn require_idle(&self, request: &str) -> Result<()> {
        match self.mode() {
            Mode::Idle => Ok(()),
            mode => Err(Error::busy(mode, request)),
        }
    }

    pub fn start_recording(&mut self) -> Result<()> {
        self.require_idle("start recording")?;
        let recorder = self
            .recorder
            .as_ref()
            .ok_or_else(|| Error::input_unavailable("session was opened for playback only"))?;
        let handle = recorder.start()?;
        self.current.clear();
        self.activity = Activity::Recording(handle);
        Ok(())
    }

    /// The live recording, for action counts and streaming
    pub fn recording(&self) -> Option<&RecordingHandle> {
        match &self.activity {
            Activity::Recording(handle) => Some(handle),
            _ => None,
        }
    }

    /// Stop recording. The recording becomes the current macro.
    pub fn stop_recording(&mut self) -> Result<&Macro> {
        match std::mem::replace(&mut self.activity, Activity::Idle) {
            Activity::Recording(handle) => {
                self.current = handle.stop();
                Ok(&self.current)
            }
            other => {
                self.activity = other;
                Err(Error::not_active("recording"))
            }
        }
    }

    /// Play the current macro on a background thread
    pub fn start_playback(&mut self, mut sink: Box<dyn InputSink>) -> Result<()> {
        self.require_idle("start playback")?;
        self.player.set_actions(self.current.clone())?;

        let (tx, progress) = unbounded();
        let player = self.player.clone();
        let thread = thread::Builder::new()
            .name("mr-player".into())
            .spawn(move || {
                player.play(sink.as_mut(), |p| {
                    let _ = tx.send(p);
                })
            })?;

        info!(actions = self.current.len(), "playback requested");
        self.activity = Activity::Playing(Playback { thread, progress });
        Ok(())
    }

    /// Progress updates of the running playback
    pub fn progress(&self) -> Option<&Receiver<Progress>> {
        match &self.activity {
            Activity::Playing(p) => Some(&p.progress),
            _ => None,
        }
    }

    /// Returns the report once the playback thread has finished on its own
    pub fn poll_playback(&mut self) -> Option<Result<PlaybackReport>> {
        let finished = matches!(&self.activity, Activity::Playing(p) if p.thread.is_finished());
        if finished {
            Some(self.finish_playback())
        } else {
            None
        }
    }

    /// Wait for playback to finish and return to idle
    pub fn finish_playback(&mut self) -> Result<PlaybackReport> {
        match std::mem::replace(&mut self.activity, Activity::Idle) {
            Activity::Playing(p) => p
                .thread
                .join()
                .unwrap_or_else(|_| Err(Error::new(crate::ErrorCode::Unknown, "playback thread panicked"))),
            other => {
                self.activity = other;
                Err(Error::not_active("playback"))
            }
        }
    }

    /// Ask playback to stop at the next action boundary and wait for it
    pub fn stop_playback(&mut self) -> Result<PlaybackReport> {
        if self.mode() != Mode::Playing {
            return Err(Error::not_active("playback"));
        }
        self.player.stop();
        self.finish_playback()
    }

    pub fn clear(&mut self) -> Result<()> {
        self.require_idle("clear")?;
        self.current.clear();
        Ok(())
    }

    /// Replace the current macro with a file. On failure the macro is untouched.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<&Macro> {
        self.require_idle("load")?;
        self.current = storage::load_from_path(path)?;
        Ok(&self.current)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        self.require_idle("save")?;
        storage::save_to_path(&self.current, path)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        match std::mem::replace(&mut self.activity, Activity::Idle) {
            Activity::Recording(handle) => {
                handle.stop();
            }
            Activity::Playing(p) => {
                self.player.stop();
                let _ = p.thread.join();
            }
            Activity::Idle => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{Action, MouseButton, Press};
    use crate::platform::virtual_input::{SinkCall, VirtualSink, VirtualSource};
    use crate::ErrorCode;
    use std::time::Duration;

    fn session() -> (Session, VirtualSource) {
        let source = VirtualSource::new();
        (Session::new(Arc::new(source.clone())), source)
    }

    fn record_two_taps(s: &mut Session, source: &VirtualSource) {
        s.start_recording().unwrap();
        source.tap("a");
        source.tap("b");
        let rec = s.recording().unwrap();
        for _ in 0..4 {
            rec.recv_timeout(Duration::from_secs(2)).unwrap();
        }
        s.stop_recording().unwrap();
    }

    #[test]
    fn record_then_play() {
        let (mut s, source) = session();
        record_two_taps(&mut s, &source);
        assert_eq!(s.mode(), Mode::Idle);
        assert_eq!(s.actions().len(), 4);

        let sink = VirtualSink::new();
        s.start_playback(Box::new(sink.clone())).unwrap();
        assert_eq!(s.mode(), Mode::Playing);
        let report = s.finish_playback().unwrap();
        assert_eq!(report.executed, 4);
        assert_eq!(s.mode(), Mode::Idle);
        assert_eq!(
            sink.calls(),
            vec![
                SinkCall::PressKey("a".into()),
                SinkCall::ReleaseKey("a".into()),
                SinkCall::PressKey("b".into()),
                SinkCall::ReleaseKey("b".into()),
            ]
        );
    }

    #[test]
    fn modes_are_exclusive() {
        let (mut s, _source) = session();
        s.start_recording().unwrap();
        let err = s.start_playback(Box::new(VirtualSink::new())).unwrap_err();
        assert_eq!(err.code, ErrorCode::Busy);
        assert_eq!(s.clear().unwrap_err().code, ErrorCode::Busy);
        assert_eq!(s.start_recording().unwrap_err().code, ErrorCode::Busy);
        s.stop_recording().unwrap();

        assert_eq!(s.stop_recording().unwrap_err().code, ErrorCode::NotActive);
        assert_eq!(s.stop_playback().unwrap_err().code, ErrorCode::NotActive);
    }

    #[test]
    fn recording_rejected_while_playing() {
        let (mut s, source) = session();
        s.start_recording().unwrap();
        source.set_cursor(1, 1);
        source.button(Press::Down, MouseButton::Left);
        s.recording().unwrap().recv_timeout(Duration::from_secs(2)).unwrap();
        s.stop_recording().unwrap();

        // Pad the macro so playback is still running when we poke at it
        let mut padded = s.actions().clone();
        padded.push(Action::key(Press::Down, "z", 0.5));
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("padded.json");
        storage::save_to_path(&padded, &file).unwrap();
        s.load(&file).unwrap();

        s.start_playback(Box::new(VirtualSink::new())).unwrap();
        let first = s.progress().unwrap().recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(first.completed, 1);
        assert_eq!(s.start_recording().unwrap_err().code, ErrorCode::Busy);
        assert_eq!(s.load(&file).unwrap_err().code, ErrorCode::Busy);
        let report = s.stop_playback().unwrap();
        assert!(report.stopped);
        assert_eq!(report.executed, 1);
    }

    #[test]
    fn poll_reports_once_finished() {
        let (mut s, _source) = session();
        s.start_playback(Box::new(VirtualSink::new())).unwrap();
        let report = loop {
            if let Some(r) = s.poll_playback() {
                break r.unwrap();
            }
            thread::sleep(Duration::from_millis(5));
        };
        assert_eq!(report.total, 0);
        assert_eq!(s.mode(), Mode::Idle);
        assert!(s.poll_playback().is_none());
    }

    #[test]
    fn failed_load_keeps_current_macro() {
        let (mut s, source) = session();
        record_two_taps(&mut s, &source);

        let dir = tempfile::tempdir().unwrap();
        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, "{not json").unwrap();
        let err = s.load(&bad).unwrap_err();
        assert_eq!(err.code, ErrorCode::LoadFailed);
        assert!(err.message.starts_with("error loading file"));
        assert_eq!(s.actions().len(), 4);

        s.clear().unwrap();
        assert!(s.actions().is_empty());
    }

    #[test]
    fn progress_is_streamed() {
        let (mut s, source) = session();
        record_two_taps(&mut s, &source);
        s.start_playback(Box::new(VirtualSink::new())).unwrap();
        let rx = s.progress().unwrap().clone();
        s.finish_playback().unwrap();
        let seen: Vec<_> = rx.try_iter().map(|p| p.completed).collect();
        assert_eq!(seen, vec![1, 2, 3, 4]);
    }

    #[test]
    fn playback_only_session_cannot_record() {
        let mut s = Session::playback_only(PlayerConfig::default()).unwrap();
        assert_eq!(s.start_recording().unwrap_err().code, ErrorCode::InputUnavailable);
        s.start_playback(Box::new(VirtualSink::new())).unwrap();
        assert_eq!(s.finish_playback().unwrap().total, 0);
    }

    #[test]
    fn unavailable_input_leaves_session_idle() {
        let source = VirtualSource::unavailable("no permission");
        let mut s = Session::new(Arc::new(source));
        assert_eq!(s.start_recording().unwrap_err().code, ErrorCode::InputUnavailable);
        assert_eq!(s.mode(), Mode::Idle);
    }
}
