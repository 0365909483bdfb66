use async_trait::async_trait;
use bytes::Bytes;
#[cfg(test)] use mockall::automock;

/// The result of reading a peer's response after sending a packet.
///
/// NB: A missing acknowledgement is not an error - it is a regular protocol-level outcome that
///      triggers a resend of the same packet
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RadioResponse {
    pub ack_received: bool,
    /// the response packet piggy-backed on the ack - empty for a 'bare ack'
    pub payload: Bytes,
}

impl RadioResponse {
    pub fn acked(payload: &[u8]) -> RadioResponse {
        RadioResponse {
            ack_received: true,
            payload: Bytes::copy_from_slice(payload),
        }
    }

    pub fn bare_ack() -> RadioResponse {
        RadioResponse {
            ack_received: true,
            payload: Bytes::new(),
        }
    }

    pub fn no_ack() -> RadioResponse {
        RadioResponse {
            ack_received: false,
            payload: Bytes::new(),
        }
    }
}

/// This is the abstraction of the radio hardware (typically a USB dongle). Implementations are
///  not expected to be thread safe: all access goes through a
///  [SharedRadio](crate::radio::shared_radio::SharedRadio) that serializes complete
///  configure / send / read transactions.
///
/// Errors returned by any of these methods are treated as transient transport problems.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RadioLink: Send + 'static {
    async fn set_channel(&mut self, channel: u8) -> anyhow::Result<()>;

    async fn set_address(&mut self, address: u64) -> anyhow::Result<()>;

    async fn send_packet(&mut self, packet: &[u8]) -> anyhow::Result<()>;

    /// Read the response for the most recently sent packet
    async fn read_response(&mut self) -> anyhow::Result<RadioResponse>;
}
