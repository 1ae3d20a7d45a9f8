//! Macro playback
//!
//! Actions are replayed in timestamp order. Before each action the player
//! sleeps for the gap to the previous action's timestamp, divided by the
//! configured speed. Stop is cooperative: it is checked before each wait and
//! again before dispatching, never in the middle of a sleep or a synthesized
//! event.

use crate::error::{Error, Result};
use crate::events::{Action, Macro, Press};
use crate::platform::InputSink;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// What to do when an action cannot be synthesized
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Log it, count it as failed, keep going
    #[default]
    Skip,
    /// End playback and return the error
    Abort,
}

#[derive(Debug, Clone)]
pub struct PlayerConfig {
    /// 1.0 = recorded timing, 2.0 = twice as fast
    pub speed: f64,
    pub on_error: FailurePolicy,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            speed: 1.0,
            on_error: FailurePolicy::Skip,
        }
    }
}

impl PlayerConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.speed.is_finite() && self.speed > 0.0) {
            return Err(Error::invalid_config(format!(
                "playback speed must be a positive number, got {}",
                self.speed
            )));
        }
        Ok(())
    }
}

/// Actions completed out of the total
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
}

impl Progress {
    /// Fraction done. An empty macro counts as fully done.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.completed as f64 / self.total as f64
        }
    }

    pub fn percent(&self) -> u8 {
        (self.fraction() * 100.0) as u8
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PlaybackReport {
    pub total: usize,
    /// Actions dispatched successfully
    pub executed: usize,
    /// Actions skipped because synthesis failed
    pub failed: usize,
    /// Playback ended early on request
    pub stopped: bool,
}

/// Cloneable handle to request a stop from another thread
#[derive(Clone)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Replays macros through an input sink
pub struct Player {
    config: PlayerConfig,
    actions: Mutex<Macro>,
    playing: AtomicBool,
    stop: Arc<AtomicBool>,
}

/// Marks the player idle again and clears any pending stop request
struct PlayingGuard<'a>(&'a Player);

impl Drop for PlayingGuard<'_> {
    fn drop(&mut self) {
        self.0.stop.store(false, Ordering::SeqCst);
        self.0.playing.store(false, Ordering::SeqCst);
    }
}

impl Player {
    pub fn new() -> Self {
        Self {
            config: PlayerConfig::default(),
            actions: Mutex::new(Macro::new()),
            playing: AtomicBool::new(false),
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_config(config: PlayerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            ..Self::new()
        })
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }

    /// Replace the macro to play. Rejected while playing.
    pub fn set_actions(&self, actions: Macro) -> Result<()> {
        if self.is_playing() {
            return Err(Error::busy("playing", "replace the macro"));
        }
        *self.actions.lock() = actions;
        self.stop.store(false, Ordering::SeqCst);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.actions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Request an early stop. Takes effect at the next action boundary;
    /// a request made before `play` starts applies to that playback.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle(self.stop.clone())
    }

    fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Scaled wait for a gap of `delay` seconds before action `index`
    fn wait_for(&self, delay: f64, index: usize) -> Result<Duration> {
        Duration::try_from_secs_f64(delay / self.config.speed).map_err(|_| {
            Error::invalid_config(format!(
                "gap of {}s before action {} cannot be waited at speed {}",
                delay,
                index + 1,
                self.config.speed
            ))
        })
    }

    /// Play the current macro on this thread, blocking until done or stopped
    pub fn play(
        &self,
        sink: &mut dyn InputSink,
        mut on_progress: impl FnMut(Progress),
    ) -> Result<PlaybackReport> {
        if self
            .playing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(Error::already_active("player"));
        }
        let _guard = PlayingGuard(self);

        let sorted = self.actions.lock().sorted();
        let total = sorted.len();
        let mut report = PlaybackReport {
            total,
            ..Default::default()
        };

        if total == 0 {
            info!("nothing to play");
            return Ok(report);
        }
        info!(total, speed = self.config.speed, "playback started");

        for (i, action) in sorted.iter().enumerate() {
            if self.stop_requested() {
                report.stopped = true;
                break;
            }

            if i > 0 {
                let delay = action.timestamp() - sorted[i - 1].timestamp();
                if delay > 0.0 {
                    std::thread::sleep(self.wait_for(delay, i)?);
                }
                if self.stop_requested() {
                    report.stopped = true;
                    break;
                }
            }

            match execute(sink, action) {
                Ok(()) => {
                    debug!(index = i, %action, "played");
                    report.executed += 1;
                }
                Err(e) => match self.config.on_error {
                    FailurePolicy::Skip => {
                        warn!(index = i, error = %e, "skipping action");
                        report.failed += 1;
                    }
                    FailurePolicy::Abort => {
                        return Err(Error::action_failed(
                            &format!("action {} ({})", i + 1, action),
                            &e.message,
                        ));
                    }
                },
            }

            on_progress(Progress {
                completed: i + 1,
                total,
            });
        }

        info!(
            executed = report.executed,
            failed = report.failed,
            stopped = report.stopped,
            "playback finished"
        );
        Ok(report)
    }
}

impl Default for Player {
    fn default() -> Self {
        Self::new()
    }
}

/// Synthesize one action. Only mouse-down moves the cursor.
fn execute(sink: &mut dyn InputSink, action: &Action) -> Result<()> {
    match action {
        Action::Mouse(m) => match m.event_type {
            Press::Down => {
                sink.move_to(m.position.0, m.position.1)?;
                sink.press_button(&m.button)
            }
            Press::Up => sink.release_button(&m.button),
        },
        Action::Keyboard(k) => match k.event_type {
            Press::Down => sink.press_key(&k.key),
            Press::Up => sink.release_key(&k.key),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::MouseButton;
    use crate::platform::virtual_input::{SinkCall, VirtualSink};
    use crate::ErrorCode;
    use std::thread;
    use std::time::Instant;

    fn keys(ts: &[(&str, f64)]) -> Macro {
        ts.iter().map(|(k, t)| Action::key(Press::Down, *k, *t)).collect()
    }

    fn pressed(sink: &VirtualSink) -> Vec<String> {
        sink.calls()
            .into_iter()
            .filter_map(|c| match c {
                SinkCall::PressKey(k) => Some(k),
                _ => None,
            })
            .collect()
    }

    fn fast() -> Player {
        Player::with_config(PlayerConfig { speed: 1000.0, ..Default::default() }).unwrap()
    }

    #[test]
    fn plays_in_timestamp_order() {
        let player = fast();
        player.set_actions(keys(&[("five", 5.0), ("one", 1.0), ("three", 3.0)])).unwrap();
        let mut sink = VirtualSink::new();
        player.play(&mut sink, |_| {}).unwrap();
        assert_eq!(pressed(&sink), vec!["one", "three", "five"]);
    }

    #[test]
    fn waits_preserve_relative_timing() {
        let player = Player::new();
        player.set_actions(keys(&[("a", 0.0), ("b", 0.2), ("c", 0.5)])).unwrap();
        let mut sink = VirtualSink::new();

        let started = Instant::now();
        let report = player.play(&mut sink, |_| {}).unwrap();
        assert!(started.elapsed() >= Duration::from_millis(500));
        assert_eq!(report.executed, 3);

        let calls = sink.timed_calls();
        assert_eq!(pressed(&sink), vec!["a", "b", "c"]);
        let gap1 = calls[1].0 - calls[0].0;
        let gap2 = calls[2].0 - calls[1].0;
        assert!(gap1 >= Duration::from_millis(200) && gap1 < Duration::from_millis(350), "{:?}", gap1);
        assert!(gap2 >= Duration::from_millis(300) && gap2 < Duration::from_millis(450), "{:?}", gap2);
    }

    #[test]
    fn empty_macro_completes_immediately() {
        let player = Player::new();
        let mut sink = VirtualSink::new();
        let mut reports = 0;
        let report = player.play(&mut sink, |_| reports += 1).unwrap();
        assert_eq!(report, PlaybackReport::default());
        assert_eq!(reports, 0);
        assert!(!player.is_playing());
        assert_eq!(Progress { completed: 0, total: 0 }.fraction(), 1.0);
    }

    #[test]
    fn progress_is_exact_and_increasing() {
        let player = fast();
        player.set_actions(keys(&[("a", 0.0), ("b", 0.01), ("c", 0.02), ("d", 0.03)])).unwrap();
        let mut seen = Vec::new();
        player.play(&mut VirtualSink::new(), |p| seen.push(p)).unwrap();

        assert_eq!(seen.len(), 4);
        for (i, p) in seen.iter().enumerate() {
            assert_eq!(p.completed, i + 1);
            assert_eq!(p.total, 4);
            assert_eq!(p.fraction(), (i + 1) as f64 / 4.0);
        }
        assert_eq!(seen.last().unwrap().percent(), 100);
    }

    #[test]
    fn mouse_up_does_not_move_cursor() {
        let player = Player::new();
        player
            .set_actions(vec![Action::mouse(Press::Up, MouseButton::Left, (300, 400), 0.0)].into())
            .unwrap();
        let mut sink = VirtualSink::new();
        sink.move_to(7, 8).unwrap();
        player.play(&mut sink, |_| {}).unwrap();

        assert_eq!(sink.cursor(), (7, 8));
        assert_eq!(
            sink.calls(),
            vec![SinkCall::MoveTo(7, 8), SinkCall::ReleaseButton(MouseButton::Left)]
        );
    }

    #[test]
    fn mouse_down_moves_then_presses() {
        let player = Player::new();
        player
            .set_actions(vec![Action::mouse(Press::Down, MouseButton::Right, (30, 40), 0.0)].into())
            .unwrap();
        let mut sink = VirtualSink::new();
        player.play(&mut sink, |_| {}).unwrap();
        assert_eq!(
            sink.calls(),
            vec![SinkCall::MoveTo(30, 40), SinkCall::PressButton(MouseButton::Right)]
        );
    }

    #[test]
    fn stop_between_actions() {
        let player = Player::new();
        player.set_actions(keys(&[("a", 0.0), ("b", 0.0), ("c", 1.0)])).unwrap();
        let stop = player.stop_handle();
        let mut sink = VirtualSink::new();

        let report = player
            .play(&mut sink, |p| {
                if p.completed == 2 {
                    stop.stop();
                }
            })
            .unwrap();

        assert!(report.stopped);
        assert_eq!(report.executed, 2);
        assert_eq!(pressed(&sink), vec!["a", "b"]);
    }

    #[test]
    fn stop_from_another_thread_during_wait() {
        let player = Arc::new(Player::new());
        player.set_actions(keys(&[("a", 0.0), ("b", 0.3), ("c", 0.6)])).unwrap();
        let sink = VirtualSink::new();

        let p = player.clone();
        let mut thread_sink = sink.clone();
        let t = thread::spawn(move || p.play(&mut thread_sink, |_| {}));

        thread::sleep(Duration::from_millis(100));
        player.stop();
        let report = t.join().unwrap().unwrap();

        assert!(report.stopped);
        assert_eq!(pressed(&sink), vec!["a"]);
    }

    #[test]
    fn set_actions_rejected_while_playing() {
        let player = Arc::new(Player::new());
        player.set_actions(keys(&[("a", 0.0), ("b", 0.3)])).unwrap();
        let p = player.clone();
        let t = thread::spawn(move || p.play(&mut VirtualSink::new(), |_| {}));

        thread::sleep(Duration::from_millis(100));
        assert!(player.is_playing());
        assert_eq!(player.set_actions(Macro::new()).unwrap_err().code, ErrorCode::Busy);
        assert_eq!(
            player.play(&mut VirtualSink::new(), |_| {}).unwrap_err().code,
            ErrorCode::AlreadyActive
        );

        t.join().unwrap().unwrap();
        assert!(!player.is_playing());
        player.set_actions(Macro::new()).unwrap();
    }

    #[test]
    fn failed_synthesis_is_skipped_by_default() {
        let player = fast();
        player.set_actions(keys(&[("a", 0.0), ("bad", 0.1), ("c", 0.2)])).unwrap();
        let mut sink = VirtualSink::new().fail_key("bad");
        let mut seen = 0;
        let report = player.play(&mut sink, |_| seen += 1).unwrap();

        assert_eq!(report.executed, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(seen, 3);
        assert_eq!(pressed(&sink), vec!["a", "c"]);
    }

    #[test]
    fn failed_synthesis_aborts_when_asked() {
        let player = Player::with_config(PlayerConfig {
            speed: 1000.0,
            on_error: FailurePolicy::Abort,
        })
        .unwrap();
        player.set_actions(keys(&[("a", 0.0), ("bad", 0.1), ("c", 0.2)])).unwrap();
        let mut sink = VirtualSink::new().fail_key("bad");
        let err = player.play(&mut sink, |_| {}).unwrap_err();

        assert_eq!(err.code, ErrorCode::ActionFailed);
        assert!(err.message.contains("action 2"));
        assert_eq!(pressed(&sink), vec!["a"]);
        assert!(!player.is_playing());
    }

    #[test]
    fn unrepresentable_gap_is_an_error() {
        let player = Player::new();
        player.set_actions(keys(&[("a", 0.0), ("b", 1e20)])).unwrap();
        let mut sink = VirtualSink::new();
        let err = player.play(&mut sink, |_| {}).unwrap_err();

        assert_eq!(err.code, ErrorCode::InvalidConfig);
        assert!(err.message.contains("action 2"));
        assert_eq!(pressed(&sink), vec!["a"]);
        assert!(!player.is_playing());
    }

    #[test]
    fn tiny_speed_overflowing_the_wait_is_an_error() {
        let player = Player::with_config(PlayerConfig { speed: 1e-300, ..Default::default() }).unwrap();
        player.set_actions(keys(&[("a", 0.0), ("b", 1.0)])).unwrap();
        let err = player.play(&mut VirtualSink::new(), |_| {}).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidConfig);
    }

    #[test]
    fn rejects_non_positive_speed() {
        let err = Player::with_config(PlayerConfig { speed: 0.0, ..Default::default() })
            .err()
            .unwrap();
        assert_eq!(err.code, ErrorCode::InvalidConfig);
    }
}
