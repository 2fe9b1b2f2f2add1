//! Channel opening and closing handshakes.
//!
//! Opening steps are split into a validation half (`chan_open_*`) that runs
//! every check and proof, and a write half (`write_open_*_channel`) that
//! commits the new channel end, logs, counts and emits the event. Closing
//! steps do both in one call.
//!
//! A channel whose two hops are both virtual skips proof verification. A
//! channel whose first hop alone is virtual still verifies proofs but parks
//! in a `*_PENDING` state until [`ChannelKeeper::resolve_pending_channel`].

use tracing::{debug, info};

use crate::capability::{Capability, CapabilityKeeper};
use crate::client::ClientKeeper;
use crate::connection::{ConnectionEnd, ConnectionKeeper};
use crate::context::Context;
use crate::error::ChannelError;
use crate::host;

use super::events;
use super::multihop::ExpectedChannel;
use super::types::{ChannelEnd, Counterparty, Height, Order, State};
use super::ChannelKeeper;

/// The connection must have negotiated exactly one version, and that version
/// must allow `ordering`.
pub(crate) fn verify_connection_ordering(connection: &ConnectionEnd, ordering: Order) -> Result<(), ChannelError> {
    let version = match connection.versions.as_slice() {
        [version] => version,
        versions => {
            return Err(ChannelError::InvalidVersion(format!(
                "single version must be negotiated on connection before opening channel, got: {:?}",
                versions
            )))
        }
    };
    if !version.supports_feature(ordering.as_str()) {
        return Err(ChannelError::InvalidVersion(format!(
            "connection version {} does not support channel ordering: {}",
            version, ordering
        )));
    }
    Ok(())
}

impl<C, L, K> ChannelKeeper<C, L, K>
where
    C: ClientKeeper,
    L: ConnectionKeeper,
    K: CapabilityKeeper,
{
    /// Initiate a channel handshake (ChanOpenInit)
    ///
    /// Allocates a channel identifier. The channel itself is written by
    /// [`Self::write_open_init_channel`], and its capability is claimed with
    /// [`ChannelKeeper::claim_channel_capability`] once that write is committed.
    ///
    /// # Arguments
    /// * `ordering` - The channel ordering (ORDERED or UNORDERED)
    /// * `connection_hops` - Connection IDs this channel will use, nearest first
    /// * `port_id` - The port identifier
    /// * `port_cap` - Capability for `port_id`
    ///
    /// # Returns
    /// * The generated channel ID
    pub fn chan_open_init(
        &self,
        ctx: &mut Context<'_>,
        ordering: Order,
        connection_hops: &[String],
        port_id: &str,
        port_cap: &Capability,
    ) -> Result<String, ChannelError> {
        let connection = self.get_open_connection(connection_hops)?;

        // TODO: multi-hop channels should check the far end's negotiated
        // version, which is only known once a proof bundle is available.
        if connection_hops.len() == 1 {
            verify_connection_ordering(&connection, ordering)?;
        }

        self.ensure_client_active(&connection.client_id)?;
        self.authenticate_port(port_cap, port_id)?;

        Ok(ctx
            .registry()
            .generate_channel_identifier(&self.config.channel_id_prefix))
    }

    /// Write a channel that passed ChanOpenInit. All sequences start at 1.
    #[allow(clippy::too_many_arguments)]
    pub fn write_open_init_channel(
        &self,
        ctx: &mut Context<'_>,
        port_id: &str,
        channel_id: &str,
        ordering: Order,
        connection_hops: &[String],
        counterparty: &Counterparty,
        version: &str,
    ) -> Result<(), ChannelError> {
        let channel = ChannelEnd::new(
            State::Init,
            ordering,
            counterparty.clone(),
            connection_hops.to_vec(),
            version.to_string(),
        );

        let mut registry = ctx.registry();
        registry.set_channel(port_id, channel_id, &channel)?;
        registry.init_sequences(port_id, channel_id);

        self.commit_transition(
            ctx,
            port_id,
            channel_id,
            State::Uninitialized,
            &channel,
            "open-init",
            events::channel_open_init(port_id, channel_id, &channel),
        );
        Ok(())
    }

    /// Respond to a channel handshake (ChanOpenTry)
    ///
    /// # Arguments
    /// * `previous_channel_id` - Channel ID of an earlier Try being retried
    /// * `counterparty` - Counterparty port and the channel ID it allocated at Init
    /// * `counterparty_version` - Version proposed by counterparty
    /// * `proof_init` - Proof of the counterparty channel in INIT
    /// * `proof_height` - Height at which proof was generated
    ///
    /// # Returns
    /// * The channel ID, reused from `previous_channel_id` on a retry
    #[allow(clippy::too_many_arguments)]
    pub fn chan_open_try(
        &self,
        ctx: &mut Context<'_>,
        ordering: Order,
        connection_hops: &[String],
        port_id: &str,
        port_cap: &Capability,
        previous_channel_id: Option<&str>,
        counterparty: &Counterparty,
        counterparty_version: &str,
        proof_init: &[u8],
        proof_height: &Height,
    ) -> Result<String, ChannelError> {
        self.authenticate_port(port_cap, port_id)?;

        let connection = self.get_open_connection(connection_hops)?;

        if let Some(previous_channel_id) = previous_channel_id {
            let previous = ctx.registry().expect_channel(port_id, previous_channel_id)?;
            if !matches!(previous.state, State::TryOpen | State::TryPending) {
                return Err(ChannelError::InvalidChannelState(format!(
                    "previous channel state should be TRYOPEN (got {})",
                    previous.state
                )));
            }
            if previous.ordering != ordering
                || previous.connection_hops != connection_hops
                || previous.counterparty.port_id != counterparty.port_id
            {
                return Err(ChannelError::InvalidChannelState(format!(
                    "channel fields mismatch previous channel, port ID ({}) channel ID ({})",
                    port_id, previous_channel_id
                )));
            }
        }

        let expected = ExpectedChannel::open_try(ordering, port_id, counterparty, counterparty_version);
        self.verify_counterparty_channel(&connection, connection_hops, proof_init, proof_height, &expected)?;

        match previous_channel_id {
            Some(channel_id) => {
                let name = host::channel_capability_name(port_id, channel_id);
                if self.capabilities.get_capability(&name).is_none() {
                    return Err(ChannelError::CapabilityNotFound(name));
                }
                Ok(channel_id.to_string())
            }
            None => Ok(ctx
                .registry()
                .generate_channel_identifier(&self.config.channel_id_prefix)),
        }
    }

    /// Write a channel that passed ChanOpenTry.
    ///
    /// Sequences are initialised only when no channel existed yet, so a
    /// retried Try leaves them untouched.
    #[allow(clippy::too_many_arguments)]
    pub fn write_open_try_channel(
        &self,
        ctx: &mut Context<'_>,
        port_id: &str,
        channel_id: &str,
        ordering: Order,
        connection_hops: &[String],
        counterparty: &Counterparty,
        version: &str,
    ) -> Result<(), ChannelError> {
        let state = if self.classifier().is_first_hop_virtual(connection_hops) {
            State::TryPending
        } else {
            State::TryOpen
        };
        let channel = ChannelEnd::new(
            state,
            ordering,
            counterparty.clone(),
            connection_hops.to_vec(),
            version.to_string(),
        );

        let mut registry = ctx.registry();
        let previous = registry.get_channel(port_id, channel_id)?;
        registry.set_channel(port_id, channel_id, &channel)?;
        if previous.is_none() {
            registry.init_sequences(port_id, channel_id);
        }

        let previous_state = previous.map(|c| c.state).unwrap_or(State::Uninitialized);
        self.commit_transition(
            ctx,
            port_id,
            channel_id,
            previous_state,
            &channel,
            "open-try",
            events::channel_open_try(port_id, channel_id, &channel),
        );
        Ok(())
    }

    /// Acknowledge a channel handshake (ChanOpenAck)
    ///
    /// # Arguments
    /// * `counterparty_channel_id` - Channel ID allocated by the counterparty at Try
    /// * `counterparty_version` - Version confirmed by counterparty
    /// * `proof_try` - Proof of the counterparty channel in TRYOPEN
    #[allow(clippy::too_many_arguments)]
    pub fn chan_open_ack(
        &self,
        ctx: &mut Context<'_>,
        port_id: &str,
        channel_id: &str,
        chan_cap: &Capability,
        counterparty_version: &str,
        counterparty_channel_id: &str,
        proof_try: &[u8],
        proof_height: &Height,
    ) -> Result<(), ChannelError> {
        let channel = ctx.registry().expect_channel(port_id, channel_id)?;
        if channel.state != State::Init {
            return Err(ChannelError::InvalidChannelState(format!(
                "channel state should be INIT (got {})",
                channel.state
            )));
        }

        self.authenticate_channel(chan_cap, port_id, channel_id)?;

        let connection = self.get_open_connection(&channel.connection_hops)?;

        let expected = ExpectedChannel::open_ack(
            &channel,
            port_id,
            channel_id,
            counterparty_channel_id,
            counterparty_version,
        );
        self.verify_counterparty_channel(&connection, &channel.connection_hops, proof_try, proof_height, &expected)
    }

    /// Write a channel that passed ChanOpenAck: OPEN, or ACK_PENDING over a virtual first hop.
    pub fn write_open_ack_channel(
        &self,
        ctx: &mut Context<'_>,
        port_id: &str,
        channel_id: &str,
        counterparty_version: &str,
        counterparty_channel_id: &str,
    ) -> Result<(), ChannelError> {
        let mut channel = self.channel_for_write(ctx, port_id, channel_id, "ChanOpenAck")?;
        let previous_state = channel.state;

        channel.state = if self.classifier().is_first_hop_virtual(&channel.connection_hops) {
            State::AckPending
        } else {
            State::Open
        };
        channel.version = counterparty_version.to_string();
        channel.counterparty.channel_id = counterparty_channel_id.to_string();

        ctx.registry().set_channel(port_id, channel_id, &channel)?;

        self.commit_transition(
            ctx,
            port_id,
            channel_id,
            previous_state,
            &channel,
            "open-ack",
            events::channel_open_ack(port_id, channel_id, &channel),
        );
        Ok(())
    }

    /// Confirm a channel handshake (ChanOpenConfirm)
    pub fn chan_open_confirm(
        &self,
        ctx: &mut Context<'_>,
        port_id: &str,
        channel_id: &str,
        chan_cap: &Capability,
        proof_ack: &[u8],
        proof_height: &Height,
    ) -> Result<(), ChannelError> {
        let channel = ctx.registry().expect_channel(port_id, channel_id)?;
        if channel.state != State::TryOpen {
            return Err(ChannelError::InvalidChannelState(format!(
                "channel state is not TRYOPEN (got {})",
                channel.state
            )));
        }

        self.authenticate_channel(chan_cap, port_id, channel_id)?;

        let connection = self.get_open_connection(&channel.connection_hops)?;

        let expected = ExpectedChannel::open_confirm(&channel, port_id, channel_id);
        self.verify_counterparty_channel(&connection, &channel.connection_hops, proof_ack, proof_height, &expected)
    }

    /// Write a channel that passed ChanOpenConfirm: OPEN, or CONFIRM_PENDING over a virtual first hop.
    pub fn write_open_confirm_channel(
        &self,
        ctx: &mut Context<'_>,
        port_id: &str,
        channel_id: &str,
    ) -> Result<(), ChannelError> {
        let mut channel = self.channel_for_write(ctx, port_id, channel_id, "ChanOpenConfirm")?;
        let previous_state = channel.state;

        channel.state = if self.classifier().is_first_hop_virtual(&channel.connection_hops) {
            State::ConfirmPending
        } else {
            State::Open
        };

        ctx.registry().set_channel(port_id, channel_id, &channel)?;

        self.commit_transition(
            ctx,
            port_id,
            channel_id,
            previous_state,
            &channel,
            "open-confirm",
            events::channel_open_confirm(port_id, channel_id, &channel),
        );
        Ok(())
    }

    /// Close a channel unilaterally (ChanCloseInit). Closed channels cannot be reopened.
    pub fn chan_close_init(
        &self,
        ctx: &mut Context<'_>,
        port_id: &str,
        channel_id: &str,
        chan_cap: &Capability,
    ) -> Result<(), ChannelError> {
        self.authenticate_channel(chan_cap, port_id, channel_id)?;

        let mut channel = ctx.registry().expect_channel(port_id, channel_id)?;
        if channel.state.is_terminal() {
            return Err(ChannelError::InvalidChannelState(format!(
                "channel is already {}",
                channel.state
            )));
        }

        let connection_id = channel
            .connection_hops
            .first()
            .ok_or_else(|| ChannelError::InvariantViolation("channel has no connection hops".to_string()))?;
        let connection = self.get_connection(connection_id)?;
        self.ensure_client_active(&connection.client_id)?;
        if !connection.is_open() {
            return Err(ChannelError::InvalidConnectionState(format!(
                "connection state is not OPEN (got {})",
                connection.state
            )));
        }

        let previous_state = channel.state;
        channel.state = State::Closed;
        ctx.registry().set_channel(port_id, channel_id, &channel)?;

        self.commit_transition(
            ctx,
            port_id,
            channel_id,
            previous_state,
            &channel,
            "close-init",
            events::channel_close_init(port_id, channel_id, &channel),
        );
        Ok(())
    }

    /// Close our end after the counterparty closed theirs (ChanCloseConfirm).
    pub fn chan_close_confirm(
        &self,
        ctx: &mut Context<'_>,
        port_id: &str,
        channel_id: &str,
        chan_cap: &Capability,
        proof_init: &[u8],
        proof_height: &Height,
    ) -> Result<(), ChannelError> {
        self.authenticate_channel(chan_cap, port_id, channel_id)?;

        let mut channel = ctx.registry().expect_channel(port_id, channel_id)?;
        if channel.state.is_terminal() || channel.state == State::CloseConfirmPending {
            return Err(ChannelError::InvalidChannelState(format!(
                "channel is already {}",
                channel.state
            )));
        }

        let connection = self.get_open_connection(&channel.connection_hops)?;

        let expected = ExpectedChannel::close_confirm(&channel, port_id, channel_id);
        self.verify_counterparty_channel(&connection, &channel.connection_hops, proof_init, proof_height, &expected)?;

        let previous_state = channel.state;
        channel.state = if self.classifier().is_first_hop_virtual(&channel.connection_hops) {
            State::CloseConfirmPending
        } else {
            State::Closed
        };
        ctx.registry().set_channel(port_id, channel_id, &channel)?;

        self.commit_transition(
            ctx,
            port_id,
            channel_id,
            previous_state,
            &channel,
            "close-confirm",
            events::channel_close_confirm(port_id, channel_id, &channel),
        );
        Ok(())
    }

    /// Terminate a multi-hop channel because a client on its path is frozen (ChanCloseFrozen).
    ///
    /// # Arguments
    /// * `proof_frozen` - Multi-hop proof of the frozen client state; its
    ///   connection proofs decide how many hops take part
    pub fn chan_close_frozen(
        &self,
        ctx: &mut Context<'_>,
        port_id: &str,
        channel_id: &str,
        chan_cap: &Capability,
        proof_frozen: &[u8],
        proof_height: &Height,
    ) -> Result<(), ChannelError> {
        self.authenticate_channel(chan_cap, port_id, channel_id)?;

        let mut channel = ctx.registry().expect_channel(port_id, channel_id)?;
        if !channel.is_multihop() {
            return Err(ChannelError::UnsupportedOperation(
                "ChanCloseFrozen is only supported on multi-hop channels".to_string(),
            ));
        }
        if channel.state.is_terminal() {
            return Err(ChannelError::InvalidChannelState(format!(
                "channel is already {}",
                channel.state
            )));
        }

        let connection = self.get_open_connection(&channel.connection_hops)?;

        self.assembler()
            .verify_frozen_client(&connection, proof_height, proof_frozen, &channel.connection_hops)?;

        let previous_state = channel.state;
        channel.state = State::Frozen;
        ctx.registry().set_channel(port_id, channel_id, &channel)?;

        self.commit_transition(
            ctx,
            port_id,
            channel_id,
            previous_state,
            &channel,
            "close-frozen",
            events::channel_close_confirm(port_id, channel_id, &channel),
        );
        Ok(())
    }

    /// Finish a virtual sub-state once the virtual side has confirmed it.
    ///
    /// # Returns
    /// * The state the channel moved to
    pub fn resolve_pending_channel(
        &self,
        ctx: &mut Context<'_>,
        port_id: &str,
        channel_id: &str,
        chan_cap: &Capability,
    ) -> Result<State, ChannelError> {
        self.authenticate_channel(chan_cap, port_id, channel_id)?;

        let mut channel = ctx.registry().expect_channel(port_id, channel_id)?;
        let previous_state = channel.state;
        if !previous_state.is_pending() {
            return Err(ChannelError::InvalidChannelState(format!(
                "channel is not in a pending state (got {})",
                previous_state
            )));
        }
        channel.state = match previous_state {
            State::TryPending => State::TryOpen,
            State::CloseConfirmPending => State::Closed,
            _ => State::Open,
        };
        ctx.registry().set_channel(port_id, channel_id, &channel)?;

        let event = match previous_state {
            State::TryPending => events::channel_open_try(port_id, channel_id, &channel),
            State::AckPending => events::channel_open_ack(port_id, channel_id, &channel),
            State::ConfirmPending => events::channel_open_confirm(port_id, channel_id, &channel),
            _ => events::channel_close_confirm(port_id, channel_id, &channel),
        };
        self.commit_transition(
            ctx,
            port_id,
            channel_id,
            previous_state,
            &channel,
            "resolve-pending",
            event,
        );
        Ok(channel.state)
    }

    /// Check the counterparty's channel end for a handshake step, directly for
    /// one hop or through the proof bundle for several. Skipped entirely for
    /// virtual-to-virtual channels.
    fn verify_counterparty_channel(
        &self,
        connection: &ConnectionEnd,
        connection_hops: &[String],
        proof: &[u8],
        proof_height: &Height,
        expected: &ExpectedChannel,
    ) -> Result<(), ChannelError> {
        if self.classifier().is_virtual_end_to_virtual_end(connection_hops) {
            debug!(step = ?expected.step(), "virtual to virtual channel, skipping proof verification");
            return Ok(());
        }

        if connection_hops.len() > 1 {
            return self.assembler().verify_channel_membership(
                connection,
                proof_height,
                proof,
                connection_hops,
                expected,
            );
        }

        if expected.requires_version_check() {
            verify_connection_ordering(connection, expected.ordering())?;
        }

        let counterparty_hops = vec![connection
            .counterparty_connection_id()
            .unwrap_or_default()
            .to_string()];
        let expected_channel = expected.channel_end(counterparty_hops);

        self.connections.verify_channel_state(
            connection,
            proof_height,
            proof,
            expected.counterparty_port_id(),
            expected.counterparty_channel_id(),
            &expected_channel,
        )?;
        Ok(())
    }

    fn channel_for_write(
        &self,
        ctx: &mut Context<'_>,
        port_id: &str,
        channel_id: &str,
        step: &str,
    ) -> Result<ChannelEnd, ChannelError> {
        ctx.registry().get_channel(port_id, channel_id)?.ok_or_else(|| {
            ChannelError::InvariantViolation(format!(
                "could not find existing channel when updating channel state in successful {} step, channelID: {}, portID: {}",
                step, channel_id, port_id
            ))
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn commit_transition(
        &self,
        ctx: &mut Context<'_>,
        port_id: &str,
        channel_id: &str,
        previous_state: State,
        channel: &ChannelEnd,
        step: &str,
        event: events::IbcEvent,
    ) {
        info!(
            port_id = %port_id,
            channel_id = %channel_id,
            previous_state = %previous_state,
            new_state = %channel.state,
            "channel state updated"
        );
        self.record(step);
        ctx.emit(event);
    }
}
