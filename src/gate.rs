//! Last-request-wins slot for supersedable fetches.
//!
//! Starting a request through a [`RequestGate`] aborts whatever the gate was
//! still waiting on. A result is only applied if its ticket is still the
//! gate's current ticket, so a late response for an abandoned floor or date
//! can never overwrite newer state even if it raced past the abort.

#[cfg(test)]
#[path = "gate_test.rs"]
mod gate_test;

use std::future::Future;

use futures::future::{AbortHandle, Abortable, Aborted, abortable};
use tracing::debug;

/// Identifies one request issued through a gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestTicket(u64);

/// A request future bound to the ticket it was issued under.
pub struct Gated<F> {
    ticket: RequestTicket,
    inner: Abortable<F>,
}

impl<F: Future> Gated<F> {
    #[must_use]
    pub fn ticket(&self) -> RequestTicket {
        self.ticket
    }

    /// Drive the request. `Err(Aborted)` means a newer request replaced it.
    pub async fn resolve(self) -> (RequestTicket, Result<F::Output, Aborted>) {
        (self.ticket, self.inner.await)
    }
}

#[derive(Default)]
pub struct RequestGate {
    current: u64,
    in_flight: Option<AbortHandle>,
}

impl RequestGate {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue `fut` as the current request, aborting the previous one.
    pub fn begin<F: Future>(&mut self, fut: F) -> Gated<F> {
        self.cancel();
        let (inner, handle) = abortable(fut);
        self.in_flight = Some(handle);
        Gated { ticket: RequestTicket(self.current), inner }
    }

    /// Abort the in-flight request, if any, without issuing a new one.
    ///
    /// Every ticket issued so far goes stale, including one whose future
    /// already completed but has not been passed to [`RequestGate::finish`].
    pub fn cancel(&mut self) {
        if let Some(handle) = self.in_flight.take() {
            handle.abort();
            debug!(ticket = self.current, "superseded request aborted");
        }
        self.current += 1;
    }

    #[must_use]
    pub fn is_current(&self, ticket: RequestTicket) -> bool {
        ticket.0 == self.current
    }

    /// Accept a finished request. Returns false if it has been superseded.
    pub fn finish(&mut self, ticket: RequestTicket) -> bool {
        if !self.is_current(ticket) {
            debug!(ticket = ticket.0, current = self.current, "discarding stale response");
            return false;
        }
        self.in_flight = None;
        true
    }

    /// True while the current request has been issued but not finished.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.in_flight.is_some()
    }
}
