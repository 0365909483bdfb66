use std::sync::{Arc, Mutex};
use anyhow::bail;
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::multiplexer::callback_registry::{CallbackId, CallbackPort, CallbackRegistry, ResponseHandler};
use crate::multiplexer::packet_queue::{PacketQueue, QueueKind};
use crate::radio::peer_addr::PeerAddr;

struct PeerEntry {
    queue: Arc<PacketQueue>,
    callbacks: Arc<CallbackRegistry>,
    connected: bool,
}

impl PeerEntry {
    fn is_unused(&self) -> bool {
        !self.connected && !self.queue.has_pending() && self.callbacks.is_empty()
    }
}

/// Per-peer queues and callback registries. Entries are created lazily on first use, and they
///  are removed as soon as they have no queued packets, no registered callbacks and no connected
///  scheduler.
///
/// All operations hold the table's lock for their full duration, so an entry can not be removed
///  while a packet or a handler is added to it. The lock is never held while handlers run.
pub struct PeerTable {
    queue_capacity: usize,
    entries: Mutex<FxHashMap<PeerAddr, PeerEntry>>,
}

impl PeerTable {
    pub fn new(queue_capacity: usize) -> PeerTable {
        PeerTable {
            queue_capacity,
            entries: Default::default(),
        }
    }

    fn with_entry<T>(&self, peer: PeerAddr, f: impl FnOnce(&mut PeerEntry) -> anyhow::Result<T>) -> anyhow::Result<T> {
        let mut entries = self.entries.lock().unwrap();
        let entry = entries.entry(peer)
            .or_insert_with(|| {
                debug!(%peer, "creating peer entry");
                PeerEntry {
                    queue: Arc::new(PacketQueue::new(peer, self.queue_capacity)),
                    callbacks: Arc::new(CallbackRegistry::new()),
                    connected: false,
                }
            });

        let result = f(entry);

        if entry.is_unused() {
            debug!(%peer, "removing unused peer entry");
            entries.remove(&peer);
        }
        result
    }

    pub fn push(&self, peer: PeerAddr, kind: QueueKind, packet: &[u8]) -> anyhow::Result<()> {
        self.with_entry(peer, |entry| entry.queue.push(kind, packet))
    }

    pub fn register_callback(&self, peer: PeerAddr, port: CallbackPort, handler: ResponseHandler) -> anyhow::Result<CallbackId> {
        self.with_entry(peer, |entry| entry.callbacks.register(port, handler))
    }

    pub fn remove_callback(&self, peer: PeerAddr, port: CallbackPort, id: CallbackId) -> anyhow::Result<()> {
        if !self.entries.lock().unwrap().contains_key(&peer) {
            bail!("no response handlers registered for peer {}", peer);
        }
        self.with_entry(peer, |entry| entry.callbacks.remove(port, id))
    }

    /// Mark a peer as connected, returning its queue and callbacks for the scheduler
    pub fn attach(&self, peer: PeerAddr) -> anyhow::Result<(Arc<PacketQueue>, Arc<CallbackRegistry>)> {
        self.with_entry(peer, |entry| {
            if entry.connected {
                bail!("peer {} is already connected", peer);
            }
            entry.connected = true;
            Ok((entry.queue.clone(), entry.callbacks.clone()))
        })
    }

    /// Called when a peer's scheduler terminated
    pub fn detach(&self, peer: PeerAddr) {
        let _ = self.with_entry(peer, |entry| {
            entry.connected = false;
            Ok(())
        });
    }

    pub fn is_connected(&self, peer: PeerAddr) -> bool {
        self.entries.lock().unwrap()
            .get(&peer)
            .map(|entry| entry.connected)
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
