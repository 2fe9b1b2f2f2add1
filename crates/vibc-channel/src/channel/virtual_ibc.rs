//! Virtual IBC classification.
//!
//! A virtual connection has one end bound to the co-located pseudo-chain
//! client. Only a channel whose two hops are both virtual may skip proofs.

use crate::connection::{ConnectionEnd, ConnectionKeeper};

pub struct VirtualityClassifier<'k, L: ConnectionKeeper + ?Sized> {
    connections: &'k L,
    virtual_client_id: &'k str,
}

impl<'k, L: ConnectionKeeper + ?Sized> VirtualityClassifier<'k, L> {
    pub fn new(connections: &'k L, virtual_client_id: &'k str) -> Self {
        Self {
            connections,
            virtual_client_id,
        }
    }

    /// Whether either end of `connection_id` is the virtual client. Unknown
    /// connections are never virtual; the connection is returned when found.
    pub fn is_virtual_connection(&self, connection_id: &str) -> (bool, Option<ConnectionEnd>) {
        match self.connections.get_connection(connection_id) {
            Some(connection) => (self.is_virtual(&connection), Some(connection)),
            None => (false, None),
        }
    }

    pub fn is_virtual(&self, connection: &ConnectionEnd) -> bool {
        connection.client_id == self.virtual_client_id
            || connection.counterparty_client_id() == self.virtual_client_id
    }

    /// True only for exactly two hops that are both virtual.
    pub fn is_virtual_end_to_virtual_end(&self, connection_hops: &[String]) -> bool {
        if connection_hops.len() != 2 {
            return false;
        }
        connection_hops
            .iter()
            .all(|hop| self.is_virtual_connection(hop).0)
    }

    /// Whether the first hop, the one this chain terminates, is virtual.
    pub fn is_first_hop_virtual(&self, connection_hops: &[String]) -> bool {
        connection_hops
            .first()
            .map(|hop| self.is_virtual_connection(hop).0)
            .unwrap_or(false)
    }
}
