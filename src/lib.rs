//! This crate multiplexes a single physical radio between any number of peers, keeping a
//!  steady, adaptive polling cadence with each of them.
//!
//! ## Background
//!
//! The peers (small flying vehicles and similar devices) are addressed by a radio channel and a
//!  40 bit address. The radio can address one of them at a time, and communication is strictly
//!  request / response: the radio sends a packet, and the peer replies with an acknowledgement
//!  which optionally carries a payload. A peer can not send anything on its own initiative, so
//!  it must be polled regularly, and peer firmware typically treats silence as a lost link.
//!
//! ## Design
//!
//! * Applications enqueue packets and register response handlers per peer through the
//!    [RadioMultiplexer](multiplexer::radio_multiplexer::RadioMultiplexer), which routes them to
//!    per-peer queues and callback registries by (channel, address)
//!   * there is a priority queue and a standard queue per peer, both bounded. Enqueueing never
//!      blocks and never drops silently: a full queue is reported to the caller
//!   * handlers are registered per port (part of a packet's header byte) or 'greedy' for all
//!      responses
//! * Each connected peer has its own communication scheduler running as a tokio task
//!   * while there is meaningful traffic, the peer is polled every `min_period` (5ms by default)
//!   * when there was no meaningful traffic for `fast_window` (2s), the polling period doubles
//!      with every tick up to `max_period` (1s)
//!   * when there is nothing to send, a keep-alive packet is sent
//!   * unacknowledged packets are resent verbatim until they are acknowledged
//!   * transport errors are logged and counted as idle ticks, they never terminate the scheduler
//! * All schedulers share a single radio. A transaction (configuring channel and address,
//!    sending a packet, reading the response) holds the radio exclusively, and waiting for the
//!    radio is FIFO fair
//! * The spacing between two transmissions to the same peer is never shorter than `min_period`,
//!    regardless of how long a peer had to wait for the radio
//!
//! The hardware driver is not part of this crate: it is plugged in through the
//!  [RadioLink](radio::radio_link::RadioLink) trait.

pub mod config;
pub mod multiplexer;
pub mod radio;
pub mod scheduler;
pub mod test_util;
