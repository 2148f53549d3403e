//! Callbacks from the renderer to the reader shell.

use crate::error::RendererError;
use crate::overlay::OverlayState;
use crate::pagination::Location;

/// Receives renderer notifications on the owner thread.
///
/// The renderer holds its delegate weakly; once the shell drops it, callbacks
/// stop and the renderer keeps working. Every method has an empty default.
pub trait RendererDelegate {
    /// The book opened and the first page is visible.
    fn content_ready(&self) {}

    /// A navigation settled at `location`.
    fn navigated(&self, _location: &Location) {}

    /// A command failed or the engine reported a problem.
    fn error(&self, _error: &RendererError) {}

    fn media_overlay_changed(&self, _state: OverlayState) {}

    /// The engine's result channel went down (`true`) or recovered (`false`).
    fn engine_degraded(&self, _degraded: bool) {}
}
