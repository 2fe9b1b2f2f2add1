//! Message server for channel messages.
//!
//! Every message runs against a cache overlay of the server's store and is
//! committed only if the whole message succeeds. The checked entry points
//! refuse messages that would let a relayer drive a virtual channel end;
//! the `_unchecked` variants are for the virtual side itself.

use tracing::{debug, error, warn};

use crate::capability::{Capability, CapabilityKeeper};
use crate::channel::{ChannelKeeper, Height, IbcEvent, State};
use crate::client::ClientKeeper;
use crate::connection::ConnectionKeeper;
use crate::context::Context;
use crate::error::ChannelError;
use crate::host;
use crate::msgs::{
    encode_json, ChannelMsg, MsgChannelCloseConfirm, MsgChannelCloseFrozen, MsgChannelCloseInit,
    MsgChannelOpenAck, MsgChannelOpenConfirm, MsgChannelOpenInit, MsgChannelOpenInitResponse,
    MsgChannelOpenTry, MsgChannelOpenTryResponse,
};
use crate::store::{CacheStore, KvStore};

const CHANNEL_OPEN_INIT: &str = "ChannelOpenInit";
const CHANNEL_OPEN_TRY: &str = "ChannelOpenTry";
const CHANNEL_OPEN_ACK: &str = "ChannelOpenAck";
const CHANNEL_OPEN_CONFIRM: &str = "ChannelOpenConfirm";
const CHANNEL_CLOSE_INIT: &str = "ChannelCloseInit";
const CHANNEL_CLOSE_CONFIRM: &str = "ChannelCloseConfirm";
const CHANNEL_CLOSE_FROZEN: &str = "ChannelCloseFrozen";
const SEND_VIRTUAL_PACKET: &str = "SendVirtualPacket";
const RESOLVE_PENDING_CHANNEL: &str = "ResolvePendingChannel";

pub struct MsgServer<S, C, L, K> {
    store: S,
    keeper: ChannelKeeper<C, L, K>,
    events: Vec<IbcEvent>,
}

impl<S, C, L, K> MsgServer<S, C, L, K>
where
    S: KvStore,
    C: ClientKeeper,
    L: ConnectionKeeper,
    K: CapabilityKeeper,
{
    pub fn new(store: S, keeper: ChannelKeeper<C, L, K>) -> Self {
        Self {
            store,
            keeper,
            events: Vec::new(),
        }
    }

    pub fn keeper(&self) -> &ChannelKeeper<C, L, K> {
        &self.keeper
    }

    pub fn keeper_mut(&mut self) -> &mut ChannelKeeper<C, L, K> {
        &mut self.keeper
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Events of committed messages, oldest first.
    pub fn events(&self) -> &[IbcEvent] {
        &self.events
    }

    pub fn take_events(&mut self) -> Vec<IbcEvent> {
        std::mem::take(&mut self.events)
    }

    /// Run `f` against a fresh overlay. Writes and events survive only on success.
    pub fn execute<T, F>(&mut self, msg_name: &str, f: F) -> Result<T, ChannelError>
    where
        F: FnOnce(&mut ChannelKeeper<C, L, K>, &mut Context<'_>) -> Result<T, ChannelError>,
    {
        let mut cache = CacheStore::new(&mut self.store);
        let mut ctx = Context::new(&mut cache);

        match f(&mut self.keeper, &mut ctx) {
            Ok(value) => {
                let events = ctx.take_events();
                drop(ctx);
                cache.commit();
                self.events.extend(events);
                Ok(value)
            }
            Err(err) => {
                if err.is_fatal() {
                    error!(msg = msg_name, error = %err, "invariant violated, message aborted");
                } else {
                    warn!(msg = msg_name, error = %err, "message rejected");
                }
                self.keeper.record_rejection(msg_name);
                Err(err)
            }
        }
    }

    /// Decode and dispatch a message by type URL, returning the JSON-encoded response.
    pub fn route(&mut self, type_url: &str, data: &[u8]) -> Result<Vec<u8>, ChannelError> {
        debug!(type_url, "routing channel message");
        match ChannelMsg::decode(type_url, data)? {
            ChannelMsg::OpenInit(msg) => encode_json(&self.channel_open_init(&msg)?),
            ChannelMsg::OpenTry(msg) => encode_json(&self.channel_open_try(&msg)?),
            ChannelMsg::OpenAck(msg) => encode_json(&self.channel_open_ack(&msg)?),
            ChannelMsg::OpenConfirm(msg) => encode_json(&self.channel_open_confirm(&msg)?),
            ChannelMsg::CloseInit(msg) => encode_json(&self.channel_close_init(&msg)?),
            ChannelMsg::CloseConfirm(msg) => encode_json(&self.channel_close_confirm(&msg)?),
            ChannelMsg::CloseFrozen(msg) => encode_json(&self.channel_close_frozen(&msg)?),
        }
    }

    pub fn bind_port(&mut self, port_id: &str) -> Result<Capability, ChannelError> {
        self.keeper.bind_port(port_id)
    }

    /// Channel capabilities live outside the store overlay, so they are only
    /// claimed once the Init or Try that allocated the channel has committed.
    fn claim_channel_capability(&mut self, port_id: &str, channel_id: &str) -> Result<Capability, ChannelError> {
        self.keeper.claim_channel_capability(port_id, channel_id).map_err(|err| {
            error!(port_id, channel_id, error = %err, "channel committed without a capability");
            err
        })
    }

    pub fn channel_open_init(&mut self, msg: &MsgChannelOpenInit) -> Result<MsgChannelOpenInitResponse, ChannelError> {
        let response = self.execute(CHANNEL_OPEN_INIT, |keeper, ctx| {
            msg.validate_basic()?;
            ensure_non_virtual_sender(keeper, &msg.channel.connection_hops, CHANNEL_OPEN_INIT)?;
            open_init(keeper, ctx, msg)
        })?;
        self.claim_channel_capability(&msg.port_id, &response.channel_id)?;
        Ok(response)
    }

    pub fn channel_open_init_unchecked(
        &mut self,
        msg: &MsgChannelOpenInit,
    ) -> Result<MsgChannelOpenInitResponse, ChannelError> {
        let response = self.execute(CHANNEL_OPEN_INIT, |keeper, ctx| {
            msg.validate_basic()?;
            open_init(keeper, ctx, msg)
        })?;
        self.claim_channel_capability(&msg.port_id, &response.channel_id)?;
        Ok(response)
    }

    pub fn channel_open_try(&mut self, msg: &MsgChannelOpenTry) -> Result<MsgChannelOpenTryResponse, ChannelError> {
        let response = self.execute(CHANNEL_OPEN_TRY, |keeper, ctx| {
            msg.validate_basic()?;
            ensure_non_virtual_hops(keeper, &msg.channel.connection_hops, CHANNEL_OPEN_TRY)?;
            open_try(keeper, ctx, msg)
        })?;
        self.claim_channel_capability(&msg.port_id, &response.channel_id)?;
        Ok(response)
    }

    pub fn channel_open_try_unchecked(
        &mut self,
        msg: &MsgChannelOpenTry,
    ) -> Result<MsgChannelOpenTryResponse, ChannelError> {
        let response = self.execute(CHANNEL_OPEN_TRY, |keeper, ctx| {
            msg.validate_basic()?;
            open_try(keeper, ctx, msg)
        })?;
        self.claim_channel_capability(&msg.port_id, &response.channel_id)?;
        Ok(response)
    }

    pub fn channel_open_ack(&mut self, msg: &MsgChannelOpenAck) -> Result<(), ChannelError> {
        self.execute(CHANNEL_OPEN_ACK, |keeper, ctx| {
            msg.validate_basic()?;
            ensure_non_virtual_channel(keeper, ctx, &msg.port_id, &msg.channel_id, CHANNEL_OPEN_ACK)?;
            open_ack(keeper, ctx, msg)
        })
    }

    pub fn channel_open_ack_unchecked(&mut self, msg: &MsgChannelOpenAck) -> Result<(), ChannelError> {
        self.execute(CHANNEL_OPEN_ACK, |keeper, ctx| {
            msg.validate_basic()?;
            open_ack(keeper, ctx, msg)
        })
    }

    pub fn channel_open_confirm(&mut self, msg: &MsgChannelOpenConfirm) -> Result<(), ChannelError> {
        self.execute(CHANNEL_OPEN_CONFIRM, |keeper, ctx| {
            msg.validate_basic()?;
            ensure_non_virtual_channel(keeper, ctx, &msg.port_id, &msg.channel_id, CHANNEL_OPEN_CONFIRM)?;
            open_confirm(keeper, ctx, msg)
        })
    }

    pub fn channel_open_confirm_unchecked(&mut self, msg: &MsgChannelOpenConfirm) -> Result<(), ChannelError> {
        self.execute(CHANNEL_OPEN_CONFIRM, |keeper, ctx| {
            msg.validate_basic()?;
            open_confirm(keeper, ctx, msg)
        })
    }

    pub fn channel_close_init(&mut self, msg: &MsgChannelCloseInit) -> Result<(), ChannelError> {
        self.execute(CHANNEL_CLOSE_INIT, |keeper, ctx| {
            msg.validate_basic()?;
            let channel = ctx.registry().expect_channel(&msg.port_id, &msg.channel_id)?;
            ensure_non_virtual_sender(keeper, &channel.connection_hops, CHANNEL_CLOSE_INIT)?;
            close_init(keeper, ctx, msg)
        })
    }

    pub fn channel_close_init_unchecked(&mut self, msg: &MsgChannelCloseInit) -> Result<(), ChannelError> {
        self.execute(CHANNEL_CLOSE_INIT, |keeper, ctx| {
            msg.validate_basic()?;
            close_init(keeper, ctx, msg)
        })
    }

    pub fn channel_close_confirm(&mut self, msg: &MsgChannelCloseConfirm) -> Result<(), ChannelError> {
        self.execute(CHANNEL_CLOSE_CONFIRM, |keeper, ctx| {
            msg.validate_basic()?;
            ensure_non_virtual_channel(keeper, ctx, &msg.port_id, &msg.channel_id, CHANNEL_CLOSE_CONFIRM)?;
            close_confirm(keeper, ctx, msg)
        })
    }

    pub fn channel_close_confirm_unchecked(&mut self, msg: &MsgChannelCloseConfirm) -> Result<(), ChannelError> {
        self.execute(CHANNEL_CLOSE_CONFIRM, |keeper, ctx| {
            msg.validate_basic()?;
            close_confirm(keeper, ctx, msg)
        })
    }

    pub fn channel_close_frozen(&mut self, msg: &MsgChannelCloseFrozen) -> Result<(), ChannelError> {
        self.execute(CHANNEL_CLOSE_FROZEN, |keeper, ctx| {
            msg.validate_basic()?;
            ensure_non_virtual_channel(keeper, ctx, &msg.port_id, &msg.channel_id, CHANNEL_CLOSE_FROZEN)?;
            close_frozen(keeper, ctx, msg)
        })
    }

    pub fn channel_close_frozen_unchecked(&mut self, msg: &MsgChannelCloseFrozen) -> Result<(), ChannelError> {
        self.execute(CHANNEL_CLOSE_FROZEN, |keeper, ctx| {
            msg.validate_basic()?;
            close_frozen(keeper, ctx, msg)
        })
    }

    /// Commit a packet handed over by the virtual chain.
    ///
    /// The server owns the channel modules, so it looks the channel capability
    /// up itself and the keeper's capability check only confirms the channel
    /// was claimed. Callers are authorised by reaching this entry point.
    #[allow(clippy::too_many_arguments)]
    pub fn send_virtual_packet(
        &mut self,
        port_id: &str,
        channel_id: &str,
        timeout_height: Height,
        timeout_timestamp: u64,
        data: Vec<u8>,
        sequence: u64,
    ) -> Result<u64, ChannelError> {
        self.execute(SEND_VIRTUAL_PACKET, |keeper, ctx| {
            let chan_cap = channel_capability(keeper, port_id, channel_id)?;
            keeper.send_virtual_packet(
                ctx,
                &chan_cap,
                port_id,
                channel_id,
                timeout_height,
                timeout_timestamp,
                data,
                sequence,
            )
        })
    }

    /// Finish a pending virtual step once the virtual side has confirmed it.
    ///
    /// The channel capability is looked up by the server, as for
    /// [`Self::send_virtual_packet`].
    pub fn resolve_pending_channel(&mut self, port_id: &str, channel_id: &str) -> Result<State, ChannelError> {
        self.execute(RESOLVE_PENDING_CHANNEL, |keeper, ctx| {
            let chan_cap = channel_capability(keeper, port_id, channel_id)?;
            keeper.resolve_pending_channel(ctx, port_id, channel_id, &chan_cap)
        })
    }
}

fn open_init<C, L, K>(
    keeper: &mut ChannelKeeper<C, L, K>,
    ctx: &mut Context<'_>,
    msg: &MsgChannelOpenInit,
) -> Result<MsgChannelOpenInitResponse, ChannelError>
where
    C: ClientKeeper,
    L: ConnectionKeeper,
    K: CapabilityKeeper,
{
    let port_cap = port_capability(keeper, &msg.port_id)?;
    let channel = &msg.channel;

    let channel_id = keeper.chan_open_init(ctx, channel.ordering, &channel.connection_hops, &msg.port_id, &port_cap)?;
    keeper.write_open_init_channel(
        ctx,
        &msg.port_id,
        &channel_id,
        channel.ordering,
        &channel.connection_hops,
        &channel.counterparty,
        &channel.version,
    )?;

    Ok(MsgChannelOpenInitResponse {
        channel_id,
        version: channel.version.clone(),
    })
}

fn open_try<C, L, K>(
    keeper: &mut ChannelKeeper<C, L, K>,
    ctx: &mut Context<'_>,
    msg: &MsgChannelOpenTry,
) -> Result<MsgChannelOpenTryResponse, ChannelError>
where
    C: ClientKeeper,
    L: ConnectionKeeper,
    K: CapabilityKeeper,
{
    let port_cap = port_capability(keeper, &msg.port_id)?;
    let channel = &msg.channel;

    let channel_id = keeper.chan_open_try(
        ctx,
        channel.ordering,
        &channel.connection_hops,
        &msg.port_id,
        &port_cap,
        msg.previous_channel_id.as_deref(),
        &channel.counterparty,
        &msg.counterparty_version,
        &msg.proof_init,
        &msg.proof_height,
    )?;
    keeper.write_open_try_channel(
        ctx,
        &msg.port_id,
        &channel_id,
        channel.ordering,
        &channel.connection_hops,
        &channel.counterparty,
        &channel.version,
    )?;

    Ok(MsgChannelOpenTryResponse {
        channel_id,
        version: channel.version.clone(),
    })
}

fn open_ack<C, L, K>(
    keeper: &mut ChannelKeeper<C, L, K>,
    ctx: &mut Context<'_>,
    msg: &MsgChannelOpenAck,
) -> Result<(), ChannelError>
where
    C: ClientKeeper,
    L: ConnectionKeeper,
    K: CapabilityKeeper,
{
    let chan_cap = channel_capability(keeper, &msg.port_id, &msg.channel_id)?;
    keeper.chan_open_ack(
        ctx,
        &msg.port_id,
        &msg.channel_id,
        &chan_cap,
        &msg.counterparty_version,
        &msg.counterparty_channel_id,
        &msg.proof_try,
        &msg.proof_height,
    )?;
    keeper.write_open_ack_channel(
        ctx,
        &msg.port_id,
        &msg.channel_id,
        &msg.counterparty_version,
        &msg.counterparty_channel_id,
    )
}

fn open_confirm<C, L, K>(
    keeper: &mut ChannelKeeper<C, L, K>,
    ctx: &mut Context<'_>,
    msg: &MsgChannelOpenConfirm,
) -> Result<(), ChannelError>
where
    C: ClientKeeper,
    L: ConnectionKeeper,
    K: CapabilityKeeper,
{
    let chan_cap = channel_capability(keeper, &msg.port_id, &msg.channel_id)?;
    keeper.chan_open_confirm(ctx, &msg.port_id, &msg.channel_id, &chan_cap, &msg.proof_ack, &msg.proof_height)?;
    keeper.write_open_confirm_channel(ctx, &msg.port_id, &msg.channel_id)
}

fn close_init<C, L, K>(
    keeper: &mut ChannelKeeper<C, L, K>,
    ctx: &mut Context<'_>,
    msg: &MsgChannelCloseInit,
) -> Result<(), ChannelError>
where
    C: ClientKeeper,
    L: ConnectionKeeper,
    K: CapabilityKeeper,
{
    let chan_cap = channel_capability(keeper, &msg.port_id, &msg.channel_id)?;
    keeper.chan_close_init(ctx, &msg.port_id, &msg.channel_id, &chan_cap)
}

fn close_confirm<C, L, K>(
    keeper: &mut ChannelKeeper<C, L, K>,
    ctx: &mut Context<'_>,
    msg: &MsgChannelCloseConfirm,
) -> Result<(), ChannelError>
where
    C: ClientKeeper,
    L: ConnectionKeeper,
    K: CapabilityKeeper,
{
    let chan_cap = channel_capability(keeper, &msg.port_id, &msg.channel_id)?;
    keeper.chan_close_confirm(ctx, &msg.port_id, &msg.channel_id, &chan_cap, &msg.proof_init, &msg.proof_height)
}

fn close_frozen<C, L, K>(
    keeper: &mut ChannelKeeper<C, L, K>,
    ctx: &mut Context<'_>,
    msg: &MsgChannelCloseFrozen,
) -> Result<(), ChannelError>
where
    C: ClientKeeper,
    L: ConnectionKeeper,
    K: CapabilityKeeper,
{
    let chan_cap = channel_capability(keeper, &msg.port_id, &msg.channel_id)?;
    keeper.chan_close_frozen(ctx, &msg.port_id, &msg.channel_id, &chan_cap, &msg.proof_frozen, &msg.proof_height)
}

fn port_capability<C, L, K>(keeper: &ChannelKeeper<C, L, K>, port_id: &str) -> Result<Capability, ChannelError>
where
    C: ClientKeeper,
    L: ConnectionKeeper,
    K: CapabilityKeeper,
{
    let name = host::port_capability_name(port_id);
    keeper
        .capabilities()
        .get_capability(&name)
        .ok_or(ChannelError::CapabilityNotFound(name))
}

fn channel_capability<C, L, K>(
    keeper: &ChannelKeeper<C, L, K>,
    port_id: &str,
    channel_id: &str,
) -> Result<Capability, ChannelError>
where
    C: ClientKeeper,
    L: ConnectionKeeper,
    K: CapabilityKeeper,
{
    let name = host::channel_capability_name(port_id, channel_id);
    keeper
        .capabilities()
        .get_capability(&name)
        .ok_or(ChannelError::CapabilityNotFound(name))
}

/// Init and CloseInit must not start from a virtual first hop.
fn ensure_non_virtual_sender<C, L, K>(
    keeper: &ChannelKeeper<C, L, K>,
    connection_hops: &[String],
    method: &str,
) -> Result<(), ChannelError>
where
    C: ClientKeeper,
    L: ConnectionKeeper,
    K: CapabilityKeeper,
{
    let connection_id = connection_hops
        .first()
        .ok_or_else(|| ChannelError::InvalidMessage("connection hops cannot be empty".to_string()))?;
    let (is_virtual, connection) = keeper.classifier().is_virtual_connection(connection_id);
    if is_virtual {
        return Err(ChannelError::InvalidConnection(format!(
            "{} can only be invoked directly on a non-virtual connection, connection: {:?}",
            method, connection
        )));
    }
    Ok(())
}

fn ensure_non_virtual_hops<C, L, K>(
    keeper: &ChannelKeeper<C, L, K>,
    connection_hops: &[String],
    method: &str,
) -> Result<(), ChannelError>
where
    C: ClientKeeper,
    L: ConnectionKeeper,
    K: CapabilityKeeper,
{
    if keeper.classifier().is_virtual_end_to_virtual_end(connection_hops) {
        return Err(ChannelError::InvalidConnection(format!(
            "{} can only be invoked directly on non-virtual connections",
            method
        )));
    }
    Ok(())
}

fn ensure_non_virtual_channel<C, L, K>(
    keeper: &ChannelKeeper<C, L, K>,
    ctx: &mut Context<'_>,
    port_id: &str,
    channel_id: &str,
    method: &str,
) -> Result<(), ChannelError>
where
    C: ClientKeeper,
    L: ConnectionKeeper,
    K: CapabilityKeeper,
{
    let channel = ctx.registry().expect_channel(port_id, channel_id)?;
    ensure_non_virtual_hops(keeper, &channel.connection_hops, method)
}
