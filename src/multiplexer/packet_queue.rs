use std::collections::VecDeque;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Mutex;
use bytes::Bytes;
use tokio::sync::Notify;
use tracing::{debug, trace};

use crate::radio::peer_addr::PeerAddr;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum QueueKind {
    Priority,
    Standard,
}

/// This error is returned when a packet is enqueued for a peer whose queue is at capacity. The
///  packet is not enqueued, and it is up to the caller to drop it or try again later.
///
/// Callers can distinguish it from other errors via [anyhow::Error::downcast_ref].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct QueueFull {
    pub peer: PeerAddr,
    pub kind: QueueKind,
    pub capacity: usize,
}

impl Display for QueueFull {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?} queue for peer {} is full ({} packets)", self.kind, self.peer, self.capacity)
    }
}

impl Error for QueueFull {}

#[derive(Default)]
struct Queues {
    priority: VecDeque<Bytes>,
    standard: VecDeque<Bytes>,
}

/// Outbound packets for a single peer: a priority queue and a standard queue, each with bounded
///  capacity. Any number of producers can enqueue concurrently, the peer's scheduler is the only
///  consumer.
///
/// Receiving always yields the head of the priority queue if there is one, falling back to
///  the standard queue.
pub struct PacketQueue {
    peer: PeerAddr,
    capacity: usize,
    queues: Mutex<Queues>,
    packet_available: Notify,
}

impl PacketQueue {
    pub fn new(peer: PeerAddr, capacity: usize) -> PacketQueue {
        PacketQueue {
            peer,
            capacity,
            queues: Default::default(),
            packet_available: Notify::new(),
        }
    }

    /// The packet is copied, so the caller is free to reuse its buffer
    pub fn push(&self, kind: QueueKind, packet: &[u8]) -> anyhow::Result<()> {
        {
            let mut queues = self.queues.lock().unwrap();
            let queue = match kind {
                QueueKind::Priority => &mut queues.priority,
                QueueKind::Standard => &mut queues.standard,
            };

            if queue.len() >= self.capacity {
                debug!(peer = %self.peer, ?kind, "queue is full - rejecting packet");
                return Err(QueueFull {
                    peer: self.peer,
                    kind,
                    capacity: self.capacity,
                }.into());
            }

            trace!(peer = %self.peer, ?kind, ?packet, "enqueueing packet");
            queue.push_back(Bytes::copy_from_slice(packet));
        }

        self.packet_available.notify_one();
        Ok(())
    }

    pub fn try_recv(&self) -> Option<Bytes> {
        let mut queues = self.queues.lock().unwrap();
        queues.priority.pop_front()
            .or_else(|| queues.standard.pop_front())
    }

    /// Wait for the next packet. This is cancel safe: if the returned future is dropped before
    ///  completing, no packet is lost.
    pub async fn recv(&self) -> Bytes {
        loop {
            let notified = self.packet_available.notified();
            tokio::pin!(notified);
            // register interest before checking, so a push between the check and the await is not missed
            notified.as_mut().enable();

            if let Some(packet) = self.try_recv() {
                return packet;
            }
            notified.await;
        }
    }

    pub fn has_pending(&self) -> bool {
        let queues = self.queues.lock().unwrap();
        !queues.priority.is_empty() || !queues.standard.is_empty()
    }

    pub fn len(&self, kind: QueueKind) -> usize {
        let queues = self.queues.lock().unwrap();
        match kind {
            QueueKind::Priority => queues.priority.len(),
            QueueKind::Standard => queues.standard.len(),
        }
    }
}
