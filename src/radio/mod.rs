//! Everything that touches the physical radio: addressing of peers, the packet header, the
//!  abstract [RadioLink](radio_link::RadioLink) capability and the [SharedRadio](shared_radio::SharedRadio)
//!  that serializes access to it.

pub mod peer_addr;
pub mod packet_header;
pub mod radio_link;
pub mod shared_radio;
