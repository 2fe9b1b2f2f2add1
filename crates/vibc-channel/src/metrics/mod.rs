// Channel handshake and packet metrics

use prometheus::{IntCounter, IntCounterVec, Opts, Registry};
use std::sync::Arc;

/// Counters bumped by successful channel state changes
pub struct ChannelMetrics {
    /// Handshake steps completed, labelled by step (`open-init`, `close-confirm`, ...)
    pub handshake_steps: IntCounterVec,
    /// Messages rejected by the message server, labelled by message type
    pub rejected_messages: IntCounterVec,
    pub virtual_packets_sent: IntCounter,

    registry: Arc<Registry>,
}

impl ChannelMetrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let handshake_steps = IntCounterVec::new(
            Opts::new("ibc_channel_handshake_steps_total", "Channel handshake steps completed"),
            &["step"],
        )?;
        let rejected_messages = IntCounterVec::new(
            Opts::new("ibc_channel_rejected_messages_total", "Channel messages rejected"),
            &["message"],
        )?;
        let virtual_packets_sent = IntCounter::new(
            "ibc_channel_virtual_packets_sent_total",
            "Total virtual packets committed",
        )?;

        registry.register(Box::new(handshake_steps.clone()))?;
        registry.register(Box::new(rejected_messages.clone()))?;
        registry.register(Box::new(virtual_packets_sent.clone()))?;

        Ok(Self {
            handshake_steps,
            rejected_messages,
            virtual_packets_sent,
            registry,
        })
    }

    pub fn record_step(&self, step: &str) {
        self.handshake_steps.with_label_values(&[step]).inc();
    }

    pub fn record_rejection(&self, message: &str) {
        self.rejected_messages.with_label_values(&[message]).inc();
    }

    pub fn step_count(&self, step: &str) -> u64 {
        self.handshake_steps.with_label_values(&[step]).get()
    }

    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_registration() {
        let metrics = ChannelMetrics::new().unwrap();

        metrics.record_step("open-init");
        metrics.record_step("open-init");
        metrics.record_rejection("ChannelOpenTry");
        metrics.virtual_packets_sent.inc();

        assert_eq!(metrics.step_count("open-init"), 2);
        assert_eq!(metrics.step_count("open-try"), 0);
        assert_eq!(metrics.virtual_packets_sent.get(), 1);

        let families = metrics.registry().gather();
        assert_eq!(families.len(), 3);
    }
}
