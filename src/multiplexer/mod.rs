//! The application-facing side: per-peer packet queues and response handlers, and the
//!  [RadioMultiplexer](radio_multiplexer::RadioMultiplexer) that routes to them and spawns the
//!  communication schedulers.

pub mod callback_registry;
pub mod packet_queue;
pub mod peer_table;
pub mod radio_multiplexer;
