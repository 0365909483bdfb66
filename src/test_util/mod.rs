//! Utilities for testing code that talks to peers through a [RadioMultiplexer](crate::multiplexer::radio_multiplexer::RadioMultiplexer).
//!  They are used for testing this crate itself, but they are also exported for application
//!  testing, so they are part of the regular (non-#[cfg(test)]) code.

pub mod scripted_radio;
