use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::RadioConfig;
use crate::multiplexer::callback_registry::{CallbackId, CallbackPort};
use crate::multiplexer::packet_queue::QueueKind;
use crate::multiplexer::peer_table::PeerTable;
use crate::radio::peer_addr::PeerAddr;
use crate::radio::radio_link::RadioLink;
use crate::radio::shared_radio::SharedRadio;
use crate::scheduler::communication_scheduler::CommunicationScheduler;
use crate::scheduler::peer_connection::{CompletionNotifier, PeerConnection};

/// Cleanup when a scheduler task ends, regardless of whether it terminated regularly or a
///  response handler panicked: the peer is detached before completion is reported, so it can
///  be connected again as soon as [PeerConnection::closed] returns.
struct SchedulerExit {
    peer: PeerAddr,
    peers: Arc<PeerTable>,
    completion: Option<CompletionNotifier>,
}

impl Drop for SchedulerExit {
    fn drop(&mut self) {
        self.peers.detach(self.peer);
        debug!(peer = %self.peer, "scheduler task finished");
        if let Some(completion) = self.completion.take() {
            completion.notify();
        }
    }
}

/// The entry point for applications: it owns the single shared radio and routes packets and
///  response handlers to peers by (channel, address).
///
/// Packets can be enqueued and handlers registered for a peer regardless of whether it is
///  connected. Packets are only sent while there is a communication scheduler for the peer,
///  which is started by [RadioMultiplexer::connect].
pub struct RadioMultiplexer {
    config: Arc<RadioConfig>,
    radio: SharedRadio,
    peers: Arc<PeerTable>,
}

impl Debug for RadioMultiplexer {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "RadioMultiplexer{{peers:{}, radio:{:?}}}", self.peers.len(), self.radio)
    }
}

impl RadioMultiplexer {
    pub fn new(radio: impl RadioLink, config: Arc<RadioConfig>) -> anyhow::Result<RadioMultiplexer> {
        config.validate()?;
        Ok(RadioMultiplexer {
            peers: Arc::new(PeerTable::new(config.queue_capacity)),
            radio: SharedRadio::new(radio),
            config,
        })
    }

    /// Enqueue a packet for a peer. The packet is copied, and it is sent after all previously
    ///  enqueued packets, and after all priority packets.
    ///
    /// This fails with [QueueFull](crate::multiplexer::packet_queue::QueueFull) if the peer's queue
    ///  is at capacity.
    pub fn send(&self, channel: u8, address: u64, packet: &[u8]) -> anyhow::Result<()> {
        self.peers.push(PeerAddr::new(channel, address), QueueKind::Standard, packet)
    }

    pub fn send_priority(&self, channel: u8, address: u64, packet: &[u8]) -> anyhow::Result<()> {
        self.peers.push(PeerAddr::new(channel, address), QueueKind::Priority, packet)
    }

    pub fn register_callback(
        &self,
        channel: u8,
        address: u64,
        port: CallbackPort,
        handler: impl Fn(&[u8]) + Send + Sync + 'static,
    ) -> anyhow::Result<CallbackId> {
        self.peers.register_callback(PeerAddr::new(channel, address), port, Arc::new(handler))
    }

    pub fn remove_callback(&self, channel: u8, address: u64, port: CallbackPort, id: CallbackId) -> anyhow::Result<()> {
        self.peers.remove_callback(PeerAddr::new(channel, address), port, id)
    }

    /// Start the communication scheduler for a peer. This fails if the peer is already connected.
    ///
    /// NB: This must be called from within a tokio runtime
    pub fn connect(&self, channel: u8, address: u64) -> anyhow::Result<PeerConnection> {
        let peer = PeerAddr::new(channel, address);
        let (queue, callbacks) = self.peers.attach(peer)?;

        let (connection, signals, completion) = PeerConnection::new(peer);
        let scheduler = CommunicationScheduler::new(peer, self.config.clone(), self.radio.clone(), queue, callbacks, signals);

        let exit = SchedulerExit {
            peer,
            peers: self.peers.clone(),
            completion: Some(completion),
        };
        tokio::spawn(async move {
            let _exit = exit;
            scheduler.run().await;
        });

        info!(%peer, "connected");
        Ok(connection)
    }

    pub fn is_connected(&self, channel: u8, address: u64) -> bool {
        self.peers.is_connected(PeerAddr::new(channel, address))
    }

    /// The shared radio, e.g. for acquiring it exclusively for operations outside the schedulers
    pub fn radio(&self) -> &SharedRadio {
        &self.radio
    }

    /// The number of peers with queued packets, registered handlers or a running scheduler
    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }
}
