//! IBC Channel keeper
//!
//! Implements the ICS-04 channel handshake, extended with multi-hop proofs and
//! virtual channels whose two ends live on co-located chains. Channel state is
//! kept in the store behind a [`Context`]; connections, clients and
//! capabilities are reached through collaborator traits.

#[cfg(feature = "metrics")]
use std::sync::Arc;

use crate::capability::{Capability, CapabilityKeeper};
use crate::client::{ClientKeeper, ClientStatus};
use crate::config::CoreConfig;
use crate::connection::{ConnectionEnd, ConnectionKeeper, State as ConnectionState};
use crate::context::Context;
use crate::error::ChannelError;
use crate::host;
#[cfg(feature = "metrics")]
use crate::metrics::ChannelMetrics;

pub mod events;
pub mod handshake;
pub mod multihop;
pub mod packet;
pub mod registry;
pub mod types;
pub mod virtual_ibc;

pub use events::{IbcEvent, IbcEventType};
pub use multihop::{ExpectedChannel, MultihopProof, MultihopProofAssembler, MultihopProofs};
pub use registry::ChannelRegistry;
pub use types::{ChannelEnd, Counterparty, Height, Order, Packet, PacketCommitment, State};
pub use virtual_ibc::VirtualityClassifier;

/// Channel keeper
///
/// Owns no channel state itself: every operation re-reads the channel from the
/// context's store and writes it back only after all checks pass.
pub struct ChannelKeeper<C, L, K> {
    config: CoreConfig,
    clients: C,
    connections: L,
    capabilities: K,
    #[cfg(feature = "metrics")]
    metrics: Option<Arc<ChannelMetrics>>,
}

impl<C, L, K> ChannelKeeper<C, L, K>
where
    C: ClientKeeper,
    L: ConnectionKeeper,
    K: CapabilityKeeper,
{
    pub fn new(config: CoreConfig, clients: C, connections: L, capabilities: K) -> Self {
        Self {
            config,
            clients,
            connections,
            capabilities,
            #[cfg(feature = "metrics")]
            metrics: None,
        }
    }

    #[cfg(feature = "metrics")]
    pub fn with_metrics(mut self, metrics: Arc<ChannelMetrics>) -> Self {
        if self.config.metrics_enabled {
            self.metrics = Some(metrics);
        }
        self
    }

    #[cfg(feature = "metrics")]
    pub fn metrics(&self) -> Option<&Arc<ChannelMetrics>> {
        self.metrics.as_ref()
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn clients(&self) -> &C {
        &self.clients
    }

    pub fn connections(&self) -> &L {
        &self.connections
    }

    pub fn capabilities(&self) -> &K {
        &self.capabilities
    }

    pub fn capabilities_mut(&mut self) -> &mut K {
        &mut self.capabilities
    }

    pub fn classifier(&self) -> VirtualityClassifier<'_, L> {
        VirtualityClassifier::new(&self.connections, &self.config.virtual_client_id)
    }

    pub fn assembler(&self) -> MultihopProofAssembler<'_, L> {
        MultihopProofAssembler::new(&self.connections)
    }

    /// Get a channel by port and channel ID
    pub fn get_channel(
        &self,
        ctx: &mut Context<'_>,
        port_id: &str,
        channel_id: &str,
    ) -> Result<Option<ChannelEnd>, ChannelError> {
        ctx.registry().get_channel(port_id, channel_id)
    }

    /// Bind a port, returning the capability that authorizes channel creation on it.
    pub fn bind_port(&mut self, port_id: &str) -> Result<Capability, ChannelError> {
        host::validate_port_identifier(port_id)?;
        Ok(self.capabilities.bind_port(port_id)?)
    }

    /// Claim the capability of a channel whose Init or Try has been committed.
    ///
    /// A retried Try hands back the capability claimed by the first attempt.
    pub fn claim_channel_capability(&mut self, port_id: &str, channel_id: &str) -> Result<Capability, ChannelError> {
        let name = host::channel_capability_name(port_id, channel_id);
        match self.capabilities.get_capability(&name) {
            Some(capability) => Ok(capability),
            None => Ok(self.capabilities.new_capability(&name)?),
        }
    }

    pub(crate) fn record(&self, step: &str) {
        #[cfg(feature = "metrics")]
        if let Some(metrics) = &self.metrics {
            metrics.record_step(step);
        }
        #[cfg(not(feature = "metrics"))]
        let _ = step;
    }

    pub(crate) fn record_rejection(&self, message: &str) {
        #[cfg(feature = "metrics")]
        if let Some(metrics) = &self.metrics {
            metrics.record_rejection(message);
        }
        #[cfg(not(feature = "metrics"))]
        let _ = message;
    }

    pub(crate) fn record_virtual_packet(&self) {
        #[cfg(feature = "metrics")]
        if let Some(metrics) = &self.metrics {
            metrics.virtual_packets_sent.inc();
        }
    }

    pub(crate) fn get_connection(&self, connection_id: &str) -> Result<ConnectionEnd, ChannelError> {
        self.connections
            .get_connection(connection_id)
            .ok_or_else(|| ChannelError::ConnectionNotFound(connection_id.to_string()))
    }

    /// First hop connection, which must be OPEN.
    pub(crate) fn get_open_connection(&self, connection_hops: &[String]) -> Result<ConnectionEnd, ChannelError> {
        let connection_id = connection_hops
            .first()
            .ok_or_else(|| ChannelError::InvalidMessage("connection hops cannot be empty".to_string()))?;
        let connection = self.get_connection(connection_id)?;
        if connection.state != ConnectionState::Open {
            return Err(ChannelError::InvalidConnectionState(format!(
                "connection state is not OPEN (got {})",
                connection.state
            )));
        }
        Ok(connection)
    }

    pub(crate) fn ensure_client_active(&self, client_id: &str) -> Result<(), ChannelError> {
        let status = self.clients.client_status(client_id)?;
        if status != ClientStatus::Active {
            return Err(ChannelError::ClientNotActive {
                client_id: client_id.to_string(),
                status,
            });
        }
        Ok(())
    }

    pub(crate) fn authenticate_port(&self, capability: &Capability, port_id: &str) -> Result<(), ChannelError> {
        if !self
            .capabilities
            .authenticate_capability(capability, &host::port_capability_name(port_id))
        {
            return Err(ChannelError::CapabilityMismatch(format!(
                "caller does not own port capability for port ID {}",
                port_id
            )));
        }
        Ok(())
    }

    pub(crate) fn authenticate_channel(
        &self,
        capability: &Capability,
        port_id: &str,
        channel_id: &str,
    ) -> Result<(), ChannelError> {
        if !self
            .capabilities
            .authenticate_capability(capability, &host::channel_capability_name(port_id, channel_id))
        {
            return Err(ChannelError::CapabilityMismatch(format!(
                "caller does not own capability for channel, port ID ({}) channel ID ({})",
                port_id, channel_id
            )));
        }
        Ok(())
    }
}
