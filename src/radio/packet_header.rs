/// The first byte of every packet exchanged with a peer. Layout:
///
/// ```ascii
/// bit 7-4: port
/// bit 3-2: link bits (reserved, used by link-level control frames)
/// bit 1-0: logical channel inside the port
/// ```
///
/// The port is used for routing responses to callbacks.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PacketHeader(u8);

impl PacketHeader {
    pub const NUM_PORTS: u8 = 16;

    /// port of link-level control traffic, including the 'nothing to report' frames
    pub const LINK_PORT: u8 = 0x0F;

    pub fn from_raw(raw: u8) -> PacketHeader {
        PacketHeader(raw)
    }

    /// returns `None` for an empty packet
    pub fn of_packet(packet: &[u8]) -> Option<PacketHeader> {
        packet.first()
            .map(|&raw| PacketHeader(raw))
    }

    pub fn raw(&self) -> u8 {
        self.0
    }

    pub fn port(&self) -> u8 {
        self.0 >> 4
    }

    pub fn channel(&self) -> u8 {
        self.0 & 0x03
    }
}
