use std::fmt::{Debug, Formatter};
use tokio::sync::watch;
use tracing::info;

use crate::radio::peer_addr::PeerAddr;

/// The application's handle for a connected peer, i.e. for a running communication scheduler.
///
/// There are two ways of terminating the scheduler: [PeerConnection::disconnect] terminates it at
///  the next opportunity, regardless of pending packets, while [PeerConnection::disconnect_when_idle]
///  lets it finish its work (resending an unacknowledged packet, draining the queue) first. Both
///  are signaled as completed through [PeerConnection::closed].
///
/// NB: Dropping the handle disconnects immediately
#[must_use = "dropping a PeerConnection disconnects the peer"]
pub struct PeerConnection {
    peer: PeerAddr,
    disconnect: watch::Sender<bool>,
    disconnect_when_idle: watch::Sender<bool>,
    completion: watch::Receiver<bool>,
}

impl Debug for PeerConnection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "PeerConnection{{peer:{:?}, closed:{}}}", self.peer(), self.is_closed())
    }
}

/// The scheduler's side of the disconnect signals
pub struct DisconnectSignals {
    disconnect: watch::Receiver<bool>,
    disconnect_when_idle: watch::Receiver<bool>,
}

impl DisconnectSignals {
    /// Completes when an immediate disconnect is requested, or when the [PeerConnection] was dropped
    pub async fn disconnect_requested(disconnect: &mut watch::Receiver<bool>) {
        let _ = disconnect.wait_for(|&requested| requested).await;
    }

    pub async fn disconnect_when_idle_requested(disconnect_when_idle: &mut watch::Receiver<bool>) {
        let _ = disconnect_when_idle.wait_for(|&requested| requested).await;
    }

    pub fn receivers(&mut self) -> (&mut watch::Receiver<bool>, &mut watch::Receiver<bool>) {
        (&mut self.disconnect, &mut self.disconnect_when_idle)
    }

    pub fn is_disconnect_when_idle_requested(&self) -> bool {
        *self.disconnect_when_idle.borrow()
    }
}

/// Reports termination of the scheduler. If this is dropped without calling `notify` (e.g.
///  because the scheduler panicked), waiting connections are released as well.
pub struct CompletionNotifier {
    completion: watch::Sender<bool>,
}

impl CompletionNotifier {
    pub fn notify(self) {
        self.completion.send_replace(true);
    }
}

impl PeerConnection {
    pub fn new(peer: PeerAddr) -> (PeerConnection, DisconnectSignals, CompletionNotifier) {
        let (disconnect, disconnect_rx) = watch::channel(false);
        let (disconnect_when_idle, disconnect_when_idle_rx) = watch::channel(false);
        let (completion, completion_rx) = watch::channel(false);

        let connection = PeerConnection {
            peer,
            disconnect,
            disconnect_when_idle,
            completion: completion_rx,
        };
        let signals = DisconnectSignals {
            disconnect: disconnect_rx,
            disconnect_when_idle: disconnect_when_idle_rx,
        };
        (connection, signals, CompletionNotifier { completion })
    }

    pub fn peer(&self) -> PeerAddr {
        self.peer
    }

    pub fn disconnect(&self) {
        info!(peer = %self.peer(), "disconnect requested");
        self.disconnect.send_replace(true);
    }

    pub fn disconnect_when_idle(&self) {
        info!(peer = %self.peer(), "disconnect when idle requested");
        self.disconnect_when_idle.send_replace(true);
    }

    /// Wait until the scheduler has terminated. This does not request termination.
    pub async fn closed(&self) {
        let mut completion = self.completion.clone();
        let _ = completion.wait_for(|&completed| completed).await;
    }

    pub fn is_closed(&self) -> bool {
        *self.completion.borrow() || self.completion.has_changed().is_err()
    }

    /// Disconnect immediately and wait for the scheduler to terminate
    pub async fn close(self) {
        self.disconnect();
        self.closed().await;
    }
}
