//! The extension contract.
//!
//! An extension declares which pipeline events it wants, each at a
//! priority, and receives every matching dispatch through a single entry
//! point. Because one instance serves all of its subscriptions, an
//! extension can hold mutable state across phases within one client:
//! inspecting the WSDL now can change how requests are built later.

use crate::bus::EventContext;
use crate::error::SoapError;
use crate::event::{EventKind, PipelineEvent};

/// One declared (event kind, priority) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subscription {
    pub kind: EventKind,
    pub priority: i32,
}

impl Subscription {
    pub fn new(kind: EventKind, priority: i32) -> Self {
        Self { kind, priority }
    }
}

/// Third-party behavior plugged into the pipeline.
pub trait Extension {
    /// The events this extension subscribes to. Read once, at attachment.
    fn subscriptions(&self) -> Vec<Subscription>;

    /// Handle a dispatched event of one of the declared kinds.
    fn on_event(
        &mut self,
        event: &mut PipelineEvent,
        ctx: &mut EventContext,
    ) -> Result<(), SoapError>;
}
