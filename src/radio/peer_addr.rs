use std::fmt::{Debug, Display, Formatter};

/// A logical peer on the shared radio. The radio can address one (channel, address) combination
///  at a time, so this pair is what is multiplexed.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct PeerAddr {
    pub channel: u8,
    /// only the lower 40 bits are used by typical hardware
    pub address: u64,
}

impl PeerAddr {
    pub fn new(channel: u8, address: u64) -> PeerAddr {
        PeerAddr { channel, address }
    }
}

impl Debug for PeerAddr {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}/{:010X}]", self.channel, self.address)
    }
}

impl Display for PeerAddr {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{:010X}", self.channel, self.address)
    }
}
