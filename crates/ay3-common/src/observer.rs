//! Playback observation callbacks.

use crate::PlaybackState;

/// Observer interface for playback events.
///
/// Drivers invoke these callbacks from their own thread; implementations
/// should return quickly and must not call back into the player.
pub trait PlaybackObserver: Send {
    /// Playback state changed (stopped/playing/paused).
    fn on_state_change(&mut self, state: PlaybackState) {
        let _ = state;
    }

    /// The player advanced to a new frame.
    fn on_frame_change(&mut self, current: u32, total: u32) {
        let _ = (current, total);
    }

    /// A non-fatal error occurred during playback.
    fn on_error(&mut self, description: &str) {
        let _ = description;
    }
}
