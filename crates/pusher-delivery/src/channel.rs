//! Broadcast channel contract.
//!
//! Both calls may fail transiently. The delivery protocol treats any error
//! as "no result yet" and keeps going until its deadline.

use std::fmt;

use async_trait::async_trait;
use pusher_types::Commitment;

use crate::Result;

/// Network-reported state of a submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxStatus {
    /// Included at the requested commitment and executed successfully.
    Confirmed,
    /// Included, but execution failed. Rebroadcasting cannot change this.
    Failed(String),
}

/// A network endpoint that accepts signed transactions.
#[async_trait]
pub trait BroadcastChannel: Send + Sync {
    /// Signed, ready-to-send transaction.
    type Tx: Send + Sync;
    /// Identifier the network uses for a transaction.
    type TxId: Clone + fmt::Display + Send + Sync;

    /// Identifier of a signed transaction. Rebroadcasting the same
    /// transaction yields the same identifier.
    fn transaction_id(&self, tx: &Self::Tx) -> Self::TxId;

    /// Submit `tx` to the network.
    async fn broadcast(&self, tx: &Self::Tx) -> Result<Self::TxId>;

    /// Look up `id` at the given commitment. `None` means not seen yet.
    async fn query_status(
        &self,
        id: &Self::TxId,
        commitment: Commitment,
    ) -> Result<Option<TxStatus>>;
}
