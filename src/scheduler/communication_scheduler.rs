use std::cmp::max;
use std::sync::Arc;
use std::time::Duration;
use bytes::Bytes;
use tokio::select;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, trace, warn};

use crate::config::RadioConfig;
use crate::multiplexer::callback_registry::CallbackRegistry;
use crate::multiplexer::packet_queue::PacketQueue;
use crate::radio::packet_header::PacketHeader;
use crate::radio::peer_addr::PeerAddr;
use crate::radio::radio_link::RadioResponse;
use crate::radio::shared_radio::SharedRadio;
use crate::scheduler::adaptive_period::AdaptivePeriod;
use crate::scheduler::peer_connection::DisconnectSignals;

/// The communication loop for a single peer. There is exactly one of these per connected peer,
///  running in its own task, and it owns all per-peer timing and retry state.
///
/// Every tick consists of
/// * waiting for `min_period` since the previous transmission, unconditionally
/// * waiting for the rest of the current period, or until a packet is queued
/// * a transaction on the shared radio with the queued packet, a resend of the previous
///    unacknowledged packet, or a keep-alive packet if there is nothing else to send
/// * dispatching the response to registered callbacks
///
/// Peer firmware acknowledges every packet and piggy-backs whatever it has to report on the ack,
///  so the peer must be polled for it to be able to send anything. The polling period adapts to
///  the peer's activity, see [AdaptivePeriod].
pub struct CommunicationScheduler {
    peer: PeerAddr,
    config: Arc<RadioConfig>,
    radio: SharedRadio,
    queue: Arc<PacketQueue>,
    callbacks: Arc<CallbackRegistry>,
    signals: DisconnectSignals,

    adaptive_period: AdaptivePeriod,
    /// no transmission before this point in time
    rate_limit: Instant,
    retry_packet: bool,
    /// the most recently sent packet, resent verbatim until it is acknowledged
    pending_packet: Bytes,
}

impl CommunicationScheduler {
    pub fn new(
        peer: PeerAddr,
        config: Arc<RadioConfig>,
        radio: SharedRadio,
        queue: Arc<PacketQueue>,
        callbacks: Arc<CallbackRegistry>,
        signals: DisconnectSignals,
    ) -> CommunicationScheduler {
        CommunicationScheduler {
            peer,
            adaptive_period: AdaptivePeriod::new(&config),
            rate_limit: Instant::now() + config.min_period,
            pending_packet: config.keep_alive_packet.clone(),
            config,
            radio,
            queue,
            callbacks,
            signals,
            retry_packet: false,
        }
    }

    pub async fn run(mut self) {
        info!(peer = %self.peer, "starting communication loop");
        while self.tick().await {}
        info!(peer = %self.peer, "communication loop terminated");
    }

    /// Returns `false` if the loop should terminate
    pub async fn tick(&mut self) -> bool {
        let period = self.adaptive_period.next_period();

        if !self.wait_for_rate_limit().await {
            return false;
        }

        let Some(packet) = self.wait_for_packet(period).await else {
            return false;
        };
        // processing time below must not reduce the spacing between transmissions
        self.rate_limit = Instant::now() + self.config.min_period;

        self.pending_packet = packet;

        let radio = self.radio.clone();
        let (disconnect, _) = self.signals.receivers();
        let link = select! {
            biased;
            _ = DisconnectSignals::disconnect_requested(disconnect) => {
                debug!(peer = %self.peer, "disconnecting while waiting for the radio");
                return false;
            }
            link = radio.lock() => link,
        };
        let transaction = SharedRadio::transaction_with(link, self.peer, &self.pending_packet).await;

        // the radio may have been busy with other peers' transactions
        self.rate_limit = max(self.rate_limit, transaction.started_at + self.config.min_period);

        self.on_transaction_result(transaction.result);
        true
    }

    async fn wait_for_rate_limit(&mut self) -> bool {
        let (disconnect, _) = self.signals.receivers();
        select! {
            biased;
            _ = DisconnectSignals::disconnect_requested(disconnect) => {
                debug!(peer = %self.peer, "disconnecting");
                false
            }
            _ = sleep_until(self.rate_limit) => true,
        }
    }

    /// Wait for the remainder of the period, or until a packet is queued. While a packet is
    ///  waiting to be resent, queued packets are ignored, and the wait always lasts for the rest
    ///  of the period.
    ///
    /// Returns the packet to send, or `None` if the loop should terminate.
    async fn wait_for_packet(&mut self, period: Duration) -> Option<Bytes> {
        let deadline = Instant::now() + period.saturating_sub(self.config.min_period);
        let retry = self.retry_packet;
        let queue = self.queue.clone();

        loop {
            let disconnect_when_idle_requested = self.signals.is_disconnect_when_idle_requested();
            if disconnect_when_idle_requested && !retry && !queue.has_pending() {
                debug!(peer = %self.peer, "idle - disconnecting");
                return None;
            }

            let (disconnect, disconnect_when_idle) = self.signals.receivers();
            select! {
                biased;
                _ = DisconnectSignals::disconnect_requested(disconnect) => {
                    debug!(peer = %self.peer, "disconnecting");
                    return None;
                }
                _ = DisconnectSignals::disconnect_when_idle_requested(disconnect_when_idle), if !disconnect_when_idle_requested => {
                    // re-check for idleness
                }
                packet = queue.recv(), if !retry => {
                    return Some(packet);
                }
                _ = sleep_until(deadline) => {
                    if retry {
                        trace!(peer = %self.peer, "resending unacknowledged packet");
                        return Some(self.pending_packet.clone());
                    }
                    return Some(self.config.keep_alive_packet.clone());
                }
            }
        }
    }

    fn on_transaction_result(&mut self, result: anyhow::Result<RadioResponse>) {
        let response = match result {
            Ok(response) => response,
            Err(e) => {
                warn!(peer = %self.peer, "radio transaction failed: {:#}", e);
                self.adaptive_period.on_idle();
                return;
            }
        };

        if !response.ack_received {
            // there is no guarantee that the peer received the packet, so it is sent again
            debug!(peer = %self.peer, "no ack");
            self.retry_packet = true;
            self.adaptive_period.on_idle();
            return;
        }
        self.retry_packet = false;

        match PacketHeader::of_packet(&response.payload) {
            None => {
                trace!(peer = %self.peer, "bare ack");
                self.adaptive_period.on_meaningful();
            }
            Some(header) => {
                trace!(peer = %self.peer, port = header.port(), channel = header.channel(), "response");
                if self.config.is_housekeeping(header.raw()) {
                    self.adaptive_period.on_idle();
                }
                else {
                    self.adaptive_period.on_meaningful();
                }
                self.callbacks.dispatch(header.port(), &response.payload);
            }
        }
    }
}
