//! In-flight query bookkeeping.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use rustc_hash::FxHashMap;
use serde_json::Value;
use tokio::sync::oneshot;

use super::ProtocolError;
use crate::transport::ClientId;

type Resolver = oneshot::Sender<Result<Value, ProtocolError>>;

/// A query waiting for its response.
#[derive(Debug)]
pub struct PendingRequest {
    /// Clients the query was addressed to
    pub targets: Vec<ClientId>,
    resolver: Resolver,
}

/// Settles when the response to one query arrives.
///
/// Resolves to the whole response message; a response carrying `error`
/// resolves to [`ProtocolError::Remote`].
#[derive(Debug)]
pub struct ResponseFuture {
    rx: oneshot::Receiver<Result<Value, ProtocolError>>,
    id: Option<u64>,
}

impl ResponseFuture {
    /// A future that is already settled with `error`.
    pub(crate) fn failed(error: ProtocolError) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(Err(error));
        Self { rx, id: None }
    }

    /// Message ID of the query, if one was sent.
    pub fn id(&self) -> Option<u64> {
        self.id
    }

    /// The outcome if already settled, without waiting.
    pub fn try_result(&mut self) -> Option<Result<Value, ProtocolError>> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(ProtocolError::Abandoned)),
        }
    }
}

impl Future for ResponseFuture {
    type Output = Result<Value, ProtocolError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(ProtocolError::Abandoned)))
    }
}

/// Message ID sequence and the queries still waiting for a response.
#[derive(Debug)]
pub struct PendingTable {
    next_id: u64,
    entries: FxHashMap<u64, PendingRequest>,
}

impl Default for PendingTable {
    fn default() -> Self {
        Self {
            next_id: 1,
            entries: FxHashMap::default(),
        }
    }
}

impl PendingTable {
    /// Allocate the next ID and record a query addressed to `targets`.
    pub fn register(&mut self, targets: Vec<ClientId>) -> (u64, ResponseFuture) {
        let id = self.allocate_id();

        let (resolver, rx) = oneshot::channel();
        self.entries.insert(id, PendingRequest { targets, resolver });
        (id, ResponseFuture { rx, id: Some(id) })
    }

    /// Allocate the next ID without tracking a query.
    pub fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Settle and forget query `id`. Returns false when it was not pending.
    pub fn settle(&mut self, id: u64, result: Result<Value, ProtocolError>) -> bool {
        match self.entries.remove(&id) {
            Some(pending) => {
                // the caller may have dropped its future; that's fine
                let _ = pending.resolver.send(result);
                true
            }
            None => false,
        }
    }

    /// Reject every query none of whose targets is still connected.
    ///
    /// Returns the rejected IDs.
    pub fn reject_orphaned(&mut self, is_connected: impl Fn(ClientId) -> bool) -> Vec<u64> {
        let orphaned: Vec<u64> = self
            .entries
            .iter()
            .filter(|(_, pending)| !pending.targets.iter().any(|c| is_connected(*c)))
            .map(|(id, _)| *id)
            .collect();
        for id in &orphaned {
            self.settle(*id, Err(ProtocolError::Disconnected));
        }
        orphaned
    }

    pub fn contains(&self, id: u64) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The ID the next query will get.
    pub fn peek_id(&self) -> u64 {
        self.next_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ids_start_at_one_and_increase() {
        let mut table = PendingTable::default();
        let (a, _fa) = table.register(vec![]);
        let (b, _fb) = table.register(vec![]);
        assert_eq!((a, b), (1, 2));
        assert_eq!(table.peek_id(), 3);
    }

    #[test]
    fn test_settle_is_exactly_once() {
        let mut table = PendingTable::default();
        let (id, mut future) = table.register(vec![ClientId(1)]);

        assert!(table.settle(id, Ok(json!({"id": id, "result": 1}))));
        assert!(!table.settle(id, Ok(json!({"id": id, "result": 2}))));
        assert_eq!(future.try_result(), Some(Ok(json!({"id": id, "result": 1}))));
    }

    #[test]
    fn test_unsettled_future_is_empty() {
        let mut table = PendingTable::default();
        let (_, mut future) = table.register(vec![]);
        assert_eq!(future.try_result(), None);
    }

    #[test]
    fn test_reject_orphaned_spares_live_targets() {
        let mut table = PendingTable::default();
        let (only_one, mut f1) = table.register(vec![ClientId(1)]);
        let (both, mut f2) = table.register(vec![ClientId(1), ClientId(2)]);

        let rejected = table.reject_orphaned(|c| c == ClientId(2));
        assert_eq!(rejected, vec![only_one]);
        assert_eq!(f1.try_result(), Some(Err(ProtocolError::Disconnected)));
        assert_eq!(f2.try_result(), None);
        assert!(table.contains(both));
    }

    #[test]
    fn test_failed_future() {
        let mut future = ResponseFuture::failed(ProtocolError::NotStarted);
        assert_eq!(future.try_result(), Some(Err(ProtocolError::NotStarted)));
        assert_eq!(future.id(), None);
    }
}
