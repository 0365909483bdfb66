use std::time::Duration;
use anyhow::bail;
use bytes::Bytes;

/// Timing and sizing parameters shared by the [RadioMultiplexer](crate::multiplexer::radio_multiplexer::RadioMultiplexer)
///  and all per-peer communication schedulers.
#[derive(Debug, Clone)]
pub struct RadioConfig {
    /// Hard lower bound for the spacing between two transmissions to the same peer. This is
    ///  also the polling period while a peer is in its 'fast window', i.e. while there was
    ///  meaningful traffic recently.
    pub min_period: Duration,

    /// Upper bound for the polling period of an idle peer. Peer firmware typically has a
    ///  communication watchdog, and this must be short enough to keep it satisfied.
    pub max_period: Duration,

    /// Time without meaningful traffic after which polling starts to back off exponentially.
    ///  The scheduler counts this in ticks of `min_period`, see [RadioConfig::fast_window_ticks].
    pub fast_window: Duration,

    /// Maximum number of packets per queue and peer. Priority and standard queue each have
    ///  this capacity.
    pub queue_capacity: usize,

    /// This packet is sent whenever there is no real traffic pending
    pub keep_alive_packet: Bytes,

    /// Raw header bytes of response packets that signal 'nothing to report'. Responses with these
    ///  headers are dispatched to callbacks, but they do not count as meaningful traffic.
    pub housekeeping_headers: Vec<u8>,
}

impl Default for RadioConfig {
    fn default() -> Self {
        RadioConfig {
            min_period: Duration::from_millis(5),
            max_period: Duration::from_millis(1000),
            fast_window: Duration::from_millis(2000),
            queue_capacity: 10,
            keep_alive_packet: Bytes::from_static(&[0xFF]),
            housekeeping_headers: vec![0xF3, 0xF7],
        }
    }
}

impl RadioConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.min_period.is_zero() {
            bail!("min_period must be positive");
        }
        if self.max_period < self.min_period {
            bail!("max_period ({:?}) must not be shorter than min_period ({:?})", self.max_period, self.min_period);
        }
        if self.queue_capacity == 0 {
            bail!("queue capacity must be positive");
        }
        if self.keep_alive_packet.is_empty() {
            bail!("keep-alive packet must contain at least a header byte");
        }
        Ok(())
    }

    /// The number of consecutive idle ticks after which the scheduler leaves the fast window
    pub fn fast_window_ticks(&self) -> u32 {
        let ticks = self.fast_window.as_nanos() / self.min_period.as_nanos().max(1);
        ticks.try_into().unwrap_or(u32::MAX)
    }

    pub fn is_housekeeping(&self, header: u8) -> bool {
        self.housekeeping_headers.contains(&header)
    }
}
