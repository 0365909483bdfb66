//! The per-peer communication loop: adaptive polling, retransmission of unacknowledged packets
//!  and dispatching of responses.

pub mod adaptive_period;
pub mod communication_scheduler;
pub mod peer_connection;
