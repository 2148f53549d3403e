//! Media overlay (synchronized narration) playback state.
//!
//! Playback runs inside the engine. The coordinator mirrors it so the shell
//! can answer `book_has_media_overlays_being_played` synchronously, keeps at
//! most one toggle outstanding, and stops narration whenever the reader
//! navigates away from the narrated page.

use serde::Serialize;
use serde_json::Value;

use crate::error::RendererError;
use crate::script::ScriptCommand;

/// Overlay availability and playback, as last reported by the engine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct OverlayState {
    /// The visible content has narration.
    pub available: bool,
    pub playing: bool,
}

#[derive(Clone, Debug)]
pub struct MediaOverlayCoordinator {
    book_has_overlays: bool,
    state: OverlayState,
    toggle_pending: bool,
}

impl MediaOverlayCoordinator {
    pub fn new(book_has_overlays: bool) -> Self {
        Self {
            book_has_overlays,
            state: OverlayState {
                available: book_has_overlays,
                playing: false,
            },
            toggle_pending: false,
        }
    }

    pub fn state(&self) -> OverlayState {
        self.state
    }

    /// The book declares overlays and the visible content has one.
    pub fn has_media_overlays(&self) -> bool {
        self.book_has_overlays && self.state.available
    }

    pub fn is_playing(&self) -> bool {
        self.state.playing
    }

    pub fn toggle_pending(&self) -> bool {
        self.toggle_pending
    }

    /// Command to toggle playback, or `None` when there is nothing to toggle
    /// or a toggle is already outstanding.
    pub fn request_toggle(&mut self) -> Option<ScriptCommand> {
        if !self.has_media_overlays() {
            log::debug!("overlay: toggle ignored, no media overlay on this page");
            return None;
        }
        if self.toggle_pending {
            log::debug!("overlay: toggle ignored, previous toggle not settled");
            return None;
        }
        self.toggle_pending = true;
        Some(ScriptCommand::ToggleMediaOverlay)
    }

    /// Settle a toggle. A boolean payload is the engine's new playback state;
    /// anything else on success flips the mirrored state. Failure leaves it.
    ///
    /// Returns `true` when the playback state changed.
    pub fn complete_toggle(&mut self, outcome: Result<&Value, &RendererError>) -> bool {
        self.toggle_pending = false;
        let playing = match outcome {
            Ok(Value::Bool(playing)) => *playing,
            Ok(_) => !self.state.playing,
            Err(err) => {
                log::warn!("overlay: toggle failed: {}", err);
                return false;
            }
        };
        self.set_playing(playing)
    }

    /// Availability query for freshly visible content; `None` for books
    /// without overlays.
    pub fn refresh_command(&self) -> Option<ScriptCommand> {
        self.book_has_overlays
            .then_some(ScriptCommand::IsMediaOverlayAvailable)
    }

    /// Returns `true` when availability changed.
    pub fn apply_availability(&mut self, outcome: Result<&Value, &RendererError>) -> bool {
        let available = match outcome {
            Ok(Value::Bool(available)) => *available,
            Ok(other) => {
                log::debug!("overlay: unexpected availability payload {}", other);
                return false;
            }
            Err(err) => {
                log::debug!("overlay: availability query failed: {}", err);
                false
            }
        };
        let available = available && self.book_has_overlays;
        if self.state.available == available {
            return false;
        }
        self.state.available = available;
        if !available {
            self.state.playing = false;
        }
        true
    }

    /// Unsolicited status report from the engine (narration reached the end
    /// of the page, the reader paused it from inside the content).
    pub fn apply_status(&mut self, playing: bool) -> bool {
        self.set_playing(playing)
    }

    /// Navigation is about to change the visible content. Returns the pause
    /// command when narration was playing.
    pub fn stop_for_navigation(&mut self) -> Option<ScriptCommand> {
        if !self.state.playing {
            return None;
        }
        log::debug!("overlay: pausing narration for navigation");
        self.state.playing = false;
        Some(ScriptCommand::PauseMediaOverlay)
    }

    fn set_playing(&mut self, playing: bool) -> bool {
        if self.state.playing == playing {
            return false;
        }
        self.state.playing = playing;
        true
    }
}
