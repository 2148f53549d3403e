//! Serialized script dispatch.
//!
//! The bridge owns a FIFO of [`PendingCommand`]s and keeps at most one of them
//! in flight. A command leaves the bridge exactly once, as a [`Settled`], when
//! the engine acknowledges it, when the engine refuses to start it, or when the
//! acknowledgment timeout elapses. Acknowledgments that do not match the
//! in-flight id are dropped, so late or duplicated completions can never
//! settle the wrong command.

use std::collections::VecDeque;
use std::fmt;
use std::time::{Duration, Instant};

use serde_json::Value;

use crate::engine::ContentEngine;
use crate::error::RendererError;
use crate::script::ScriptCommand;

/// Correlation id shared by a queued command and its engine completion.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CommandId(pub u64);

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Callback run once with a command's outcome.
pub type ResultHandler = Box<dyn FnOnce(Result<&Value, &RendererError>)>;

/// Box a closure as a [`ResultHandler`].
pub fn result_handler<F>(handler: F) -> ResultHandler
where
    F: FnOnce(Result<&Value, &RendererError>) + 'static,
{
    Box::new(handler)
}

/// A queued script invocation.
pub struct PendingCommand {
    id: CommandId,
    command: ScriptCommand,
    script: String,
    handler: Option<ResultHandler>,
    enqueued_at: Instant,
}

impl PendingCommand {
    pub fn id(&self) -> CommandId {
        self.id
    }

    pub fn command(&self) -> &ScriptCommand {
        &self.command
    }

    /// Encoded script text handed to the engine.
    pub fn script(&self) -> &str {
        &self.script
    }

    pub fn has_handler(&self) -> bool {
        self.handler.is_some()
    }
}

impl fmt::Debug for PendingCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingCommand")
            .field("id", &self.id)
            .field("command", &self.command.name())
            .field("script", &self.script)
            .field("has_handler", &self.handler.is_some())
            .finish_non_exhaustive()
    }
}

/// A command that left the bridge, with its outcome.
pub struct Settled {
    pub id: CommandId,
    pub command: ScriptCommand,
    pub outcome: Result<Value, RendererError>,
    handler: Option<ResultHandler>,
}

impl Settled {
    /// Run the caller's handler, if any. Subsequent calls do nothing.
    pub fn run_handler(&mut self) {
        if let Some(handler) = self.handler.take() {
            handler(self.outcome.as_ref());
        }
    }
}

impl fmt::Debug for Settled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settled")
            .field("id", &self.id)
            .field("command", &self.command.name())
            .field("outcome", &self.outcome)
            .finish_non_exhaustive()
    }
}

/// Result of one [`ScriptBridge::dispatch_next`] attempt.
#[derive(Debug)]
pub enum Dispatch {
    /// Nothing queued.
    Idle,
    /// A command is already in flight.
    Busy,
    /// The queue head was handed to the engine.
    Sent(CommandId),
    /// The engine refused the queue head; it settled as failed.
    Refused(Settled),
}

struct InFlight {
    pending: PendingCommand,
    dispatched_at: Instant,
}

/// FIFO script queue with a single in-flight slot.
pub struct ScriptBridge {
    queue: VecDeque<PendingCommand>,
    in_flight: Option<InFlight>,
    next_id: u64,
    ack_timeout: Duration,
}

impl fmt::Debug for ScriptBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptBridge")
            .field("queued", &self.queue.len())
            .field("in_flight", &self.in_flight().map(PendingCommand::id))
            .field("ack_timeout", &self.ack_timeout)
            .finish()
    }
}

impl ScriptBridge {
    pub fn new(ack_timeout: Duration) -> Self {
        Self {
            queue: VecDeque::with_capacity(8),
            in_flight: None,
            next_id: 1,
            ack_timeout,
        }
    }

    /// Applies to the in-flight command as well.
    pub fn set_ack_timeout(&mut self, ack_timeout: Duration) {
        self.ack_timeout = ack_timeout;
    }

    /// Encode `command` and append it to the queue.
    ///
    /// Nothing is queued when encoding fails.
    pub fn enqueue(
        &mut self,
        command: ScriptCommand,
        handler: Option<ResultHandler>,
        now: Instant,
    ) -> Result<CommandId, RendererError> {
        let pending = self.encode(command, handler, now)?;
        let id = pending.id;
        log::trace!("bridge: queued {} {}", id, pending.command.name());
        self.queue.push_back(pending);
        Ok(id)
    }

    /// Like [`enqueue`](Self::enqueue), but ahead of everything already queued.
    ///
    /// Reserved for commands later ones depend on, such as opening the book
    /// once the host document is (re)loaded. The in-flight command is unaffected.
    pub fn enqueue_front(
        &mut self,
        command: ScriptCommand,
        handler: Option<ResultHandler>,
        now: Instant,
    ) -> Result<CommandId, RendererError> {
        let pending = self.encode(command, handler, now)?;
        let id = pending.id;
        log::trace!("bridge: queued {} {} at front", id, pending.command.name());
        self.queue.push_front(pending);
        Ok(id)
    }

    fn encode(
        &mut self,
        command: ScriptCommand,
        handler: Option<ResultHandler>,
        now: Instant,
    ) -> Result<PendingCommand, RendererError> {
        let script = command.to_script()?;
        let id = CommandId(self.next_id);
        self.next_id += 1;
        Ok(PendingCommand {
            id,
            command,
            script,
            handler,
            enqueued_at: now,
        })
    }

    /// True from dispatch until the in-flight command settles.
    pub fn javascript_is_running(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Commands waiting for dispatch, oldest first. Excludes the in-flight one.
    pub fn queued(&self) -> impl ExactSizeIterator<Item = &PendingCommand> + '_ {
        self.queue.iter()
    }

    pub fn in_flight(&self) -> Option<&PendingCommand> {
        self.in_flight.as_ref().map(|running| &running.pending)
    }

    pub fn is_idle(&self) -> bool {
        self.in_flight.is_none() && self.queue.is_empty()
    }

    /// True if a queued or in-flight command matches `predicate`.
    pub fn any_pending(&self, predicate: impl Fn(&ScriptCommand) -> bool) -> bool {
        self.in_flight()
            .into_iter()
            .chain(self.queue.iter())
            .any(|pending| predicate(&pending.command))
    }

    /// Hand the queue head to `engine` unless a command is already running.
    pub fn dispatch_next<E>(&mut self, engine: &mut E, now: Instant) -> Dispatch
    where
        E: ContentEngine + ?Sized,
    {
        if self.in_flight.is_some() {
            return Dispatch::Busy;
        }
        let Some(pending) = self.queue.pop_front() else {
            return Dispatch::Idle;
        };
        let id = pending.id;
        let running = self.in_flight.insert(InFlight {
            pending,
            dispatched_at: now,
        });
        match engine.evaluate(id, &running.pending.script) {
            Ok(()) => {
                log::debug!(
                    "bridge: dispatched {} after {}ms queued",
                    id,
                    now.saturating_duration_since(running.pending.enqueued_at)
                        .as_millis()
                );
                Dispatch::Sent(id)
            }
            Err(err) => {
                log::warn!("bridge: engine refused {}: {}", id, err);
                match self.in_flight.take() {
                    Some(running) => Dispatch::Refused(settle(running.pending, Err(err.into()))),
                    None => Dispatch::Idle,
                }
            }
        }
    }

    /// Settle the in-flight command if `id` matches it.
    ///
    /// `result` is the engine's raw completion: JSON text or a script error.
    pub fn complete(&mut self, id: CommandId, result: Result<String, String>) -> Option<Settled> {
        let matches = self
            .in_flight
            .as_ref()
            .is_some_and(|running| running.pending.id == id);
        if !matches {
            log::debug!("bridge: ignoring acknowledgment for {} (not in flight)", id);
            return None;
        }
        let running = self.in_flight.take()?;
        let outcome = parse_result(running.pending.command.name(), result);
        Some(settle(running.pending, outcome))
    }

    /// Fail the in-flight command once its acknowledgment window has elapsed.
    pub fn expire(&mut self, now: Instant) -> Option<Settled> {
        let waited = {
            let running = self.in_flight.as_ref()?;
            now.saturating_duration_since(running.dispatched_at)
        };
        if waited < self.ack_timeout {
            return None;
        }
        let running = self.in_flight.take()?;
        let command = running.pending.command.name();
        log::warn!(
            "bridge: {} {} timed out after {}ms",
            running.pending.id,
            command,
            waited.as_millis()
        );
        let err = RendererError::BridgeTimeout {
            command,
            waited_ms: u64::try_from(waited.as_millis()).unwrap_or(u64::MAX),
        };
        Some(settle(running.pending, Err(err)))
    }

    /// Fail the in-flight command without waiting for its acknowledgment.
    pub fn interrupt(&mut self) -> Option<Settled> {
        let running = self.in_flight.take()?;
        let command = running.pending.command.name();
        log::debug!("bridge: {} {} interrupted", running.pending.id, command);
        Some(settle(
            running.pending,
            Err(RendererError::Interrupted { command }),
        ))
    }

    /// Fail the in-flight command and everything queued, oldest first.
    pub fn interrupt_all(&mut self) -> Vec<Settled> {
        let mut settled: Vec<Settled> = self.interrupt().into_iter().collect();
        settled.extend(self.queue.drain(..).map(|pending| {
            let command = pending.command.name();
            settle(pending, Err(RendererError::Interrupted { command }))
        }));
        settled
    }

    /// Drop every queued and in-flight command without running handlers.
    pub fn clear(&mut self) -> usize {
        let dropped = self.queue.len() + usize::from(self.in_flight.is_some());
        self.queue.clear();
        self.in_flight = None;
        dropped
    }
}

fn settle(pending: PendingCommand, outcome: Result<Value, RendererError>) -> Settled {
    Settled {
        id: pending.id,
        command: pending.command,
        outcome,
        handler: pending.handler,
    }
}

fn parse_result(command: &'static str, result: Result<String, String>) -> Result<Value, RendererError> {
    let text = result.map_err(|message| RendererError::ScriptFailed { command, message })?;
    let text = text.trim();
    if text.is_empty() || text == "undefined" {
        return Ok(Value::Null);
    }
    serde_json::from_str(text).map_err(|err| RendererError::MalformedResponse {
        command,
        message: err.to_string(),
    })
}
