use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use anyhow::Context;
use tokio::sync::{Mutex, MutexGuard};
use tokio::time::Instant;
use tracing::trace;

use crate::radio::peer_addr::PeerAddr;
use crate::radio::radio_link::{RadioLink, RadioResponse};

/// Exclusive access to the radio. The radio is released when the guard is dropped.
pub type RadioGuard<'a> = MutexGuard<'a, Box<dyn RadioLink>>;

/// The outcome of a single configure / send / read round trip
pub struct Transaction {
    /// the point in time when the radio was acquired, i.e. when this transaction actually started
    ///  after waiting for other peers' transactions
    pub started_at: Instant,
    pub result: anyhow::Result<RadioResponse>,
}

/// The single physical radio, shared by all peers' schedulers. There is exactly one instance of
///  this per radio, and it is handed to every scheduler explicitly.
///
/// The radio can only address one channel / address combination at a time, so a complete
///  transaction (configuring channel and address, sending a packet and reading the response)
///  happens while holding a lock. The lock is FIFO fair, so a busy peer can not starve others.
#[derive(Clone)]
pub struct SharedRadio {
    link: Arc<Mutex<Box<dyn RadioLink>>>,
}

impl Debug for SharedRadio {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "SharedRadio{{locked:{}}}", self.link.try_lock().is_err())
    }
}

impl SharedRadio {
    pub fn new(link: impl RadioLink) -> SharedRadio {
        SharedRadio {
            link: Arc::new(Mutex::new(Box::new(link))),
        }
    }

    /// Acquire the radio for use outside the regular per-peer transactions, e.g. for bulk
    ///  operations that must not be interleaved with other peers' traffic.
    pub async fn lock(&self) -> RadioGuard<'_> {
        self.link.lock().await
    }

    pub fn try_lock(&self) -> Option<RadioGuard<'_>> {
        self.link.try_lock().ok()
    }

    /// Perform a complete transaction with a peer, holding the radio exclusively for its full
    ///  duration. The radio is released before this function returns - on success and on
    ///  error - so the caller processes the response without blocking other peers.
    pub async fn transaction(&self, peer: PeerAddr, packet: &[u8]) -> Transaction {
        let link = self.lock().await;
        Self::transaction_with(link, peer, packet).await
    }

    /// Perform a transaction on a radio that was acquired by the caller, e.g. while observing
    ///  a cancellation signal. The guard is consumed, so the radio is released when this
    ///  function returns.
    pub async fn transaction_with(mut link: RadioGuard<'_>, peer: PeerAddr, packet: &[u8]) -> Transaction {
        let started_at = Instant::now();
        trace!(%peer, ?packet, "radio acquired");

        let result = Self::do_transaction(&mut **link, peer, packet).await;
        drop(link);

        trace!(%peer, "radio released");
        Transaction {
            started_at,
            result,
        }
    }

    async fn do_transaction(link: &mut dyn RadioLink, peer: PeerAddr, packet: &[u8]) -> anyhow::Result<RadioResponse> {
        link.set_channel(peer.channel).await
            .with_context(|| format!("configuring channel {}", peer.channel))?;
        link.set_address(peer.address).await
            .with_context(|| format!("configuring address {:010X}", peer.address))?;
        link.send_packet(packet).await
            .context("sending packet")?;
        link.read_response().await
            .context("reading response")
    }
}

#[cfg(test)]
mod tests {
    use anyhow::anyhow;
    use mockall::predicate::eq;
    use mockall::Sequence;
    use super::*;
    use crate::radio::radio_link::MockRadioLink;
    use crate::test_util::scripted_radio::ScriptedRadio;

    #[tokio::test]
    async fn test_transaction_order() {
        let mut link = MockRadioLink::new();
        let mut seq = Sequence::new();
        link.expect_set_channel()
            .with(eq(80))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        link.expect_set_address()
            .with(eq(0xE7E7E7E701))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        link.expect_send_packet()
            .withf(|packet| packet.to_vec() == vec![0x30, 1, 2])
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        link.expect_read_response()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(RadioResponse::acked(&[0x30, 9])));

        let radio = SharedRadio::new(link);
        let transaction = radio.transaction(PeerAddr::new(80, 0xE7E7E7E701), &[0x30, 1, 2]).await;

        assert_eq!(transaction.result.unwrap(), RadioResponse::acked(&[0x30, 9]));
        assert!(radio.try_lock().is_some());
    }

    #[tokio::test]
    async fn test_transaction_configure_failure_releases_radio() {
        let mut link = MockRadioLink::new();
        link.expect_set_channel()
            .returning(|_| Ok(()));
        link.expect_set_address()
            .returning(|_| Err(anyhow!("usb stall")));
        link.expect_send_packet()
            .never();
        link.expect_read_response()
            .never();

        let radio = SharedRadio::new(link);
        let transaction = radio.transaction(PeerAddr::new(2, 3), &[0xFF]).await;

        assert!(transaction.result.is_err());
        assert!(radio.try_lock().is_some());
    }

    #[tokio::test]
    async fn test_transaction_send_failure_releases_radio() {
        let mut link = MockRadioLink::new();
        link.expect_set_channel()
            .returning(|_| Ok(()));
        link.expect_set_address()
            .returning(|_| Ok(()));
        link.expect_send_packet()
            .times(1)
            .returning(|_| Err(anyhow!("usb timeout")));
        link.expect_read_response()
            .never();

        let radio = SharedRadio::new(link);
        let transaction = radio.transaction(PeerAddr::new(2, 3), &[0xFF]).await;

        let err = transaction.result.unwrap_err();
        assert!(format!("{:#}", err).contains("usb timeout"));
        assert!(radio.try_lock().is_some());
    }

    #[tokio::test]
    async fn test_transaction_no_ack_is_not_an_error() {
        let mut link = MockRadioLink::new();
        link.expect_set_channel()
            .returning(|_| Ok(()));
        link.expect_set_address()
            .returning(|_| Ok(()));
        link.expect_send_packet()
            .returning(|_| Ok(()));
        link.expect_read_response()
            .returning(|| Ok(RadioResponse::no_ack()));

        let radio = SharedRadio::new(link);
        let transaction = radio.transaction(PeerAddr::new(2, 3), &[0xFF]).await;

        assert!(!transaction.result.unwrap().ack_received);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_transactions_are_not_interleaved() {
        let scripted = ScriptedRadio::new();
        let radio = SharedRadio::new(scripted.clone());

        let mut handles = Vec::new();
        for n in 0..8u8 {
            let radio = radio.clone();
            handles.push(tokio::spawn(async move {
                for _ in 0..20 {
                    let _ = radio.transaction(PeerAddr::new(n, 1000 + n as u64), &[0x30, n]).await;
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let transmissions = scripted.transmissions();
        assert_eq!(transmissions.len(), 8 * 20);
        for t in transmissions {
            let n = t.packet[1];
            assert_eq!(t.peer, PeerAddr::new(n, 1000 + n as u64));
        }
    }

    #[tokio::test]
    async fn test_transaction_with_releases_radio() {
        let scripted = ScriptedRadio::new();
        let radio = SharedRadio::new(scripted.clone());

        let guard = radio.lock().await;
        let transaction = SharedRadio::transaction_with(guard, PeerAddr::new(4, 5), &[0x30, 1]).await;

        assert!(transaction.result.is_ok());
        assert!(radio.try_lock().is_some());
        assert_eq!(scripted.transmissions_to(PeerAddr::new(4, 5)).len(), 1);
    }

    #[tokio::test]
    async fn test_explicit_lock_blocks_transactions() {
        let scripted = ScriptedRadio::new();
        let radio = SharedRadio::new(scripted.clone());

        let guard = radio.lock().await;

        let radio_2 = radio.clone();
        let handle = tokio::spawn(async move {
            radio_2.transaction(PeerAddr::new(1, 1), &[0xFF]).await.result.is_ok()
        });

        tokio::task::yield_now().await;
        assert!(scripted.transmissions().is_empty());

        drop(guard);
        assert!(handle.await.unwrap());
        assert_eq!(scripted.transmissions().len(), 1);
    }
}
