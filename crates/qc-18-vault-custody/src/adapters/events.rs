//! Event sink that records emitted events.

use parking_lot::RwLock;
use tracing::debug;

use crate::error::CustodyResult;
use crate::events::CustodyEvent;
use crate::ports::outbound::EventSink;

pub struct InMemoryEventSink {
    events: RwLock<Vec<CustodyEvent>>,
}

impl InMemoryEventSink {
    pub fn new() -> Self {
        Self {
            events: RwLock::new(Vec::new()),
        }
    }

    pub fn events(&self) -> Vec<CustodyEvent> {
        self.events.read().clone()
    }

    pub fn count(&self, pred: impl Fn(&CustodyEvent) -> bool) -> usize {
        self.events.read().iter().filter(|e| pred(e)).count()
    }
}

impl Default for InMemoryEventSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for InMemoryEventSink {
    fn emit(&self, event: CustodyEvent) -> CustodyResult<()> {
        debug!(?event, "[qc-18] event");
        self.events.write().push(event);
        Ok(())
    }
}
