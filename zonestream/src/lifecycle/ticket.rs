//! Shared handles to in-flight zone loads.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::future::{FutureExt, Shared};

use super::state::DetailLevel;
use crate::error::ZoneError;
use crate::host::BoxFuture;
use crate::registry::ZoneId;

/// Outcome of a load request: the level the zone settled at, or the failure.
pub type LoadOutcome = Result<DetailLevel, ZoneError>;

/// A cloneable, awaitable handle to a load request.
///
/// Every caller coalesced onto the same request holds a clone of the same
/// ticket and observes the same outcome. The underlying load makes progress
/// whenever any clone is polled: awaiting it in async code, or calling
/// [`poll_now`](Self::poll_now) once per frame from the host loop.
#[derive(Clone)]
pub struct LoadTicket {
    zone: ZoneId,
    target: DetailLevel,
    inner: Shared<BoxFuture<'static, LoadOutcome>>,
}

impl LoadTicket {
    pub(crate) fn new<F>(zone: ZoneId, target: DetailLevel, future: F) -> Self
    where
        F: Future<Output = LoadOutcome> + Send + 'static,
    {
        let boxed: BoxFuture<'static, LoadOutcome> = Box::pin(future);
        Self {
            zone,
            target,
            inner: boxed.shared(),
        }
    }

    /// A ticket that is already resolved.
    pub(crate) fn ready(zone: ZoneId, target: DetailLevel, outcome: LoadOutcome) -> Self {
        Self::new(zone, target, futures::future::ready(outcome))
    }

    /// Zone being loaded.
    pub fn zone(&self) -> &ZoneId {
        &self.zone
    }

    /// Level requested by the call that produced this ticket.
    pub fn target(&self) -> DetailLevel {
        self.target
    }

    /// Outcome, if some poll has already driven the load to completion.
    pub fn peek(&self) -> Option<&LoadOutcome> {
        self.inner.peek()
    }

    /// Poll the load once without blocking.
    ///
    /// Returns the outcome once resolved. Safe to call every frame.
    pub fn poll_now(&self) -> Option<LoadOutcome> {
        if let Some(outcome) = self.inner.peek() {
            return Some(outcome.clone());
        }
        self.inner.clone().now_or_never()
    }

    /// Whether two tickets refer to the same underlying request.
    pub fn same_request(&self, other: &LoadTicket) -> bool {
        Shared::ptr_eq(&self.inner, &other.inner)
    }
}

impl Future for LoadTicket {
    type Output = LoadOutcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner.poll_unpin(cx)
    }
}

impl fmt::Debug for LoadTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadTicket")
            .field("zone", &self.zone)
            .field("target", &self.target)
            .field("resolved", &self.inner.peek().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ready_ticket() {
        let ticket = LoadTicket::ready("a".into(), DetailLevel::Full, Ok(DetailLevel::Full));
        assert_eq!(ticket.poll_now(), Some(Ok(DetailLevel::Full)));
        assert_eq!(ticket.peek(), Some(&Ok(DetailLevel::Full)));
    }

    #[tokio::test]
    async fn test_clones_share_outcome() {
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let ticket = LoadTicket::new("a".into(), DetailLevel::Simplified, async move {
            let _ = rx.await;
            Ok(DetailLevel::Simplified)
        });
        let other = ticket.clone();

        assert!(ticket.same_request(&other));
        assert_eq!(ticket.poll_now(), None);

        tx.send(()).unwrap();
        assert_eq!(other.await, Ok(DetailLevel::Simplified));
        assert_eq!(ticket.peek(), Some(&Ok(DetailLevel::Simplified)));
    }

    #[test]
    fn test_distinct_requests() {
        let a = LoadTicket::ready("a".into(), DetailLevel::Full, Ok(DetailLevel::Full));
        let b = LoadTicket::ready("a".into(), DetailLevel::Full, Ok(DetailLevel::Full));
        assert!(!a.same_request(&b));
    }
}
