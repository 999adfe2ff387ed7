//! Ordered, priority-based event dispatch.
//!
//! Handlers for an event kind run in descending priority order; equal
//! priorities run in subscription order (stable across repeated
//! dispatches). Every handler sees the same mutable payload, a handler may
//! stop propagation to skip the rest, and handler errors propagate to the
//! dispatch caller unsuppressed.

use std::cmp::Reverse;
use tracing::debug;

use crate::error::SoapError;
use crate::event::{EventKind, PipelineEvent};
use crate::extension::Extension;

/// Priority used for the orchestrator's default handlers, guaranteed to
/// run after every extension-supplied subscription.
pub const FALLBACK_PRIORITY: i32 = i32::MIN;

/// Per-dispatch propagation control handed to each handler.
#[derive(Debug, Default)]
pub struct EventContext {
    stopped: bool,
}

impl EventContext {
    /// Halt further handler execution for this dispatch.
    pub fn stop_propagation(&mut self) {
        self.stopped = true;
    }

    /// Whether a handler already stopped propagation.
    pub fn propagation_stopped(&self) -> bool {
        self.stopped
    }
}

/// Outcome of a single dispatch.
#[derive(Debug, Clone, Copy)]
pub struct DispatchOutcome {
    /// True if some handler stopped propagation.
    pub stopped: bool,
    /// Number of handlers that actually ran.
    pub handlers_run: usize,
}

/// A single event handler.
///
/// Implemented for any `FnMut(&mut PipelineEvent, &mut EventContext)`
/// closure returning `Result<(), SoapError>`.
pub trait EventListener {
    fn on_event(
        &mut self,
        event: &mut PipelineEvent,
        ctx: &mut EventContext,
    ) -> Result<(), SoapError>;
}

impl<F> EventListener for F
where
    F: FnMut(&mut PipelineEvent, &mut EventContext) -> Result<(), SoapError>,
{
    fn on_event(
        &mut self,
        event: &mut PipelineEvent,
        ctx: &mut EventContext,
    ) -> Result<(), SoapError> {
        self(event, ctx)
    }
}

/// Box a closure as a listener.
pub fn listener_fn<F>(f: F) -> Box<dyn EventListener>
where
    F: FnMut(&mut PipelineEvent, &mut EventContext) -> Result<(), SoapError> + 'static,
{
    Box::new(f)
}

/// The dispatcher contract.
///
/// The client creates a private [`InMemoryDispatcher`] unless a caller
/// supplies another implementation satisfying this contract.
pub trait EventDispatcher {
    /// Subscribe a listener to one event kind at the given priority.
    fn subscribe(&mut self, kind: EventKind, listener: Box<dyn EventListener>, priority: i32);

    /// Subscribe an extension to every event kind it declares.
    fn subscribe_extension(&mut self, extension: Box<dyn Extension>);

    /// Invoke all handlers subscribed to the event's kind, in order,
    /// passing the same mutable payload to each.
    fn dispatch(&mut self, event: &mut PipelineEvent) -> Result<DispatchOutcome, SoapError>;
}

enum Target {
    Listener(Box<dyn EventListener>),
    Extension(usize),
}

struct Entry {
    kind: EventKind,
    priority: i32,
    seq: u64,
    target: Target,
}

/// In-process dispatcher backing a single client instance.
///
/// All state is instance-scoped; dispatch is synchronous and not
/// reentrant.
#[derive(Default)]
pub struct InMemoryDispatcher {
    entries: Vec<Entry>,
    extensions: Vec<Box<dyn Extension>>,
    next_seq: u64,
}

impl InMemoryDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }
}

impl EventDispatcher for InMemoryDispatcher {
    fn subscribe(&mut self, kind: EventKind, listener: Box<dyn EventListener>, priority: i32) {
        let seq = self.next_seq();
        self.entries.push(Entry {
            kind,
            priority,
            seq,
            target: Target::Listener(listener),
        });
    }

    fn subscribe_extension(&mut self, extension: Box<dyn Extension>) {
        let subscriptions = extension.subscriptions();
        let slot = self.extensions.len();
        self.extensions.push(extension);
        for subscription in subscriptions {
            let seq = self.next_seq();
            self.entries.push(Entry {
                kind: subscription.kind,
                priority: subscription.priority,
                seq,
                target: Target::Extension(slot),
            });
        }
    }

    fn dispatch(&mut self, event: &mut PipelineEvent) -> Result<DispatchOutcome, SoapError> {
        let kind = event.kind();

        let mut order: Vec<usize> = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.kind == kind)
            .map(|(index, _)| index)
            .collect();
        order.sort_by_key(|&index| (Reverse(self.entries[index].priority), self.entries[index].seq));

        let mut ctx = EventContext::default();
        let mut handlers_run = 0;

        for index in order {
            match &mut self.entries[index].target {
                Target::Listener(listener) => listener.on_event(event, &mut ctx)?,
                Target::Extension(slot) => {
                    let slot = *slot;
                    self.extensions[slot].on_event(event, &mut ctx)?
                }
            }
            handlers_run += 1;
            if ctx.propagation_stopped() {
                break;
            }
        }

        debug!(
            event = kind.as_str(),
            handlers = handlers_run,
            stopped = ctx.propagation_stopped(),
            "event dispatched"
        );

        Ok(DispatchOutcome {
            stopped: ctx.propagation_stopped(),
            handlers_run,
        })
    }
}
