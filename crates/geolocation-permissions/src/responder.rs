use geoperm_core_types::Origin;

use crate::events::DecisionSource;

/// A decision waiting to be handed to the tab's documents.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Resolution {
    pub origin: Origin,
    pub allow: bool,
    pub source: DecisionSource,
}

impl Resolution {
    pub fn new(origin: Origin, allow: bool, source: DecisionSource) -> Self {
        Self {
            origin,
            allow,
            source,
        }
    }
}

/// Identifies one scheduled delivery turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeliveryTicket(u64);

/// Single-slot deferred delivery for decisions already known at query time.
///
/// Delivery happens on a later turn of the tab loop, never inside the query
/// that found the cached answer. A second resolution arriving before that
/// turn replaces the first one; only one delivery is made, with the newest
/// pair.
#[derive(Debug, Default)]
pub struct AsyncResponder {
    pending: Option<Resolution>,
    armed: Option<DeliveryTicket>,
    generation: u64,
}

impl AsyncResponder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `resolution` in the slot. Returns a ticket when the caller must
    /// post a delivery turn; `None` when a turn is already on its way.
    pub fn schedule(&mut self, resolution: Resolution) -> Option<DeliveryTicket> {
        self.pending = Some(resolution);
        if self.armed.is_some() {
            return None;
        }
        self.generation += 1;
        let ticket = DeliveryTicket(self.generation);
        self.armed = Some(ticket);
        Some(ticket)
    }

    /// Takes the pending resolution if `ticket` is the live one.
    pub fn fire(&mut self, ticket: DeliveryTicket) -> Option<Resolution> {
        if self.armed != Some(ticket) {
            return None;
        }
        self.armed = None;
        self.pending.take()
    }

    /// Drops the pending resolution; a turn already posted becomes a no-op.
    pub fn cancel(&mut self) {
        self.pending = None;
        self.armed = None;
    }

    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }

    pub fn pending(&self) -> Option<&Resolution> {
        self.pending.as_ref()
    }
}
