//! Content engine seam.
//!
//! The engine is an embedded web view (or anything that behaves like one): it
//! loads a host document, evaluates script text asynchronously and reports back
//! through an [`EngineEventSender`]. The sender is `Send + Clone`, so engines
//! may complete work from their own threads; the renderer drains the events on
//! its owner thread in [`WebViewRenderer::pump`](crate::WebViewRenderer::pump).

use std::sync::mpsc::{channel, Receiver, Sender};

use crate::bridge::CommandId;
use crate::geometry::Rect;

/// Scriptable content surface driven by the renderer.
pub trait ContentEngine {
    /// Hand the engine its event sender. Called once, before any other method.
    fn attach(&mut self, events: EngineEventSender);

    /// Begin loading the host document that runs the reader scripts.
    ///
    /// Progress is reported with [`EngineEvent::LoadStarted`] and
    /// [`EngineEvent::LoadFinished`] (or [`EngineEvent::LoadFailed`]).
    fn load_host_document(&mut self, frame: Rect) -> Result<(), EngineError>;

    /// Start evaluating `script`. Must not block; completion is reported with
    /// [`EngineEvent::ScriptCompleted`] carrying the same `id`.
    fn evaluate(&mut self, id: CommandId, script: &str) -> Result<(), EngineError>;

    /// The renderer frame changed (rotation, split view).
    fn set_frame(&mut self, _frame: Rect) {}

    /// The session is going away; release the surface.
    fn shutdown(&mut self) {}
}

/// Messages from the engine to the renderer's owner thread.
#[derive(Clone, Debug, PartialEq)]
pub enum EngineEvent {
    /// The host document started (re)loading.
    LoadStarted,
    /// The host document finished loading and scripts may run.
    LoadFinished,
    /// The host document could not be loaded.
    LoadFailed { message: String },
    /// A script finished. `Ok` carries the JSON-serialized result, `Err` the
    /// script error message.
    ScriptCompleted {
        id: CommandId,
        result: Result<String, String>,
    },
    /// The engine's result channel went down or came back.
    ResponderChanged { responding: bool },
    /// Periodic liveness signal from the result channel.
    Heartbeat,
    /// The engine repaginated on its own (reflow, resize). JSON pagination info.
    PaginationChanged { payload: String },
    /// Media overlay playback started or stopped inside the engine.
    MediaOverlayStatusChanged { playing: bool },
}

/// Cloneable, thread-safe sender engines use to report events.
#[derive(Clone, Debug)]
pub struct EngineEventSender {
    tx: Sender<EngineEvent>,
}

impl EngineEventSender {
    /// Send an event. Returns `false` once the renderer has been dropped.
    pub fn send(&self, event: EngineEvent) -> bool {
        self.tx.send(event).is_ok()
    }

    /// Report a successful script with its JSON-serialized result.
    pub fn complete(&self, id: CommandId, result_json: impl Into<String>) -> bool {
        self.send(EngineEvent::ScriptCompleted {
            id,
            result: Ok(result_json.into()),
        })
    }

    /// Report a script that raised an error.
    pub fn fail(&self, id: CommandId, message: impl Into<String>) -> bool {
        self.send(EngineEvent::ScriptCompleted {
            id,
            result: Err(message.into()),
        })
    }
}

pub(crate) fn event_channel() -> (EngineEventSender, Receiver<EngineEvent>) {
    let (tx, rx) = channel();
    (EngineEventSender { tx }, rx)
}

/// Synchronous engine refusal (detached surface, evaluation unavailable).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineError {
    message: String,
}

impl EngineError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl core::fmt::Display for EngineError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for EngineError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn events_cross_threads_in_order() {
        let (sender, rx) = event_channel();
        let worker = {
            let sender = sender.clone();
            thread::spawn(move || {
                sender.send(EngineEvent::LoadStarted);
                sender.send(EngineEvent::ResponderChanged { responding: false });
                sender.complete(CommandId(7), "true");
            })
        };
        worker.join().expect("worker thread");
        let events: Vec<EngineEvent> = rx.try_iter().collect();
        assert_eq!(
            events,
            vec![
                EngineEvent::LoadStarted,
                EngineEvent::ResponderChanged { responding: false },
                EngineEvent::ScriptCompleted {
                    id: CommandId(7),
                    result: Ok("true".to_string()),
                },
            ]
        );
    }

    #[test]
    fn send_reports_dropped_receiver() {
        let (sender, rx) = event_channel();
        drop(rx);
        assert!(!sender.fail(CommandId(1), "gone"));
    }
}
