use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use anyhow::bail;
use async_trait::async_trait;
use bytes::Bytes;
use tokio::time::Instant;

use crate::radio::peer_addr::PeerAddr;
use crate::radio::radio_link::{RadioLink, RadioResponse};

/// The outcome of the next transaction on a [ScriptedRadio]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ScriptStep {
    Respond(RadioResponse),
    FailConfigure,
    FailSend,
    FailRead,
}

/// A send attempt as seen by the radio
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Transmission {
    pub at: Instant,
    pub peer: PeerAddr,
    pub packet: Bytes,
    pub succeeded: bool,
}

struct ScriptedRadioInner {
    steps: VecDeque<ScriptStep>,
    default_response: RadioResponse,
    current_step: Option<ScriptStep>,
    channel: Option<u8>,
    address: Option<u64>,
    attempts: Vec<Transmission>,
}

/// An in-memory [RadioLink] for tests: it plays back a script of responses and failures, falling
///  back to a default response when the script is exhausted, and it records every send attempt
///  with a (tokio) timestamp.
///
/// Clones share their state, so a test can keep a clone for inspection and hand another one to
///  the code under test. Every operation yields to the runtime once to give concurrent tasks a
///  chance to interleave.
#[derive(Clone)]
pub struct ScriptedRadio {
    inner: Arc<Mutex<ScriptedRadioInner>>,
}

impl Default for ScriptedRadio {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedRadio {
    /// By default, the radio acks every packet with a link-level 'nothing to report' frame, the
    ///  way an idle peer does
    pub fn new() -> ScriptedRadio {
        Self::with_default_response(RadioResponse::acked(&[0xF3]))
    }

    pub fn with_default_response(default_response: RadioResponse) -> ScriptedRadio {
        ScriptedRadio {
            inner: Arc::new(Mutex::new(ScriptedRadioInner {
                steps: VecDeque::new(),
                default_response,
                current_step: None,
                channel: None,
                address: None,
                attempts: Vec::new(),
            })),
        }
    }

    pub fn push_step(&self, step: ScriptStep) {
        self.inner.lock().unwrap()
            .steps.push_back(step);
    }

    pub fn push_steps(&self, steps: impl IntoIterator<Item = ScriptStep>) {
        self.inner.lock().unwrap()
            .steps.extend(steps);
    }

    pub fn set_default_response(&self, response: RadioResponse) {
        self.inner.lock().unwrap()
            .default_response = response;
    }

    /// all send attempts, including failed ones
    pub fn attempts(&self) -> Vec<Transmission> {
        self.inner.lock().unwrap()
            .attempts.clone()
    }

    /// successful sends only
    pub fn transmissions(&self) -> Vec<Transmission> {
        self.attempts().into_iter()
            .filter(|t| t.succeeded)
            .collect()
    }

    pub fn transmissions_to(&self, peer: PeerAddr) -> Vec<Transmission> {
        self.transmissions().into_iter()
            .filter(|t| t.peer == peer)
            .collect()
    }
}

#[async_trait]
impl RadioLink for ScriptedRadio {
    async fn set_channel(&mut self, channel: u8) -> anyhow::Result<()> {
        tokio::task::yield_now().await;

        let mut inner = self.inner.lock().unwrap();
        inner.current_step = inner.steps.pop_front();
        if inner.current_step == Some(ScriptStep::FailConfigure) {
            bail!("scripted configuration failure");
        }
        inner.channel = Some(channel);
        Ok(())
    }

    async fn set_address(&mut self, address: u64) -> anyhow::Result<()> {
        tokio::task::yield_now().await;

        self.inner.lock().unwrap()
            .address = Some(address);
        Ok(())
    }

    async fn send_packet(&mut self, packet: &[u8]) -> anyhow::Result<()> {
        tokio::task::yield_now().await;

        let mut inner = self.inner.lock().unwrap();
        let (Some(channel), Some(address)) = (inner.channel, inner.address) else {
            bail!("sending before the radio was configured");
        };
        let succeeded = inner.current_step != Some(ScriptStep::FailSend);
        inner.attempts.push(Transmission {
            at: Instant::now(),
            peer: PeerAddr::new(channel, address),
            packet: Bytes::copy_from_slice(packet),
            succeeded,
        });

        if !succeeded {
            bail!("scripted send failure");
        }
        Ok(())
    }

    async fn read_response(&mut self) -> anyhow::Result<RadioResponse> {
        tokio::task::yield_now().await;

        let mut inner = self.inner.lock().unwrap();
        match inner.current_step.take() {
            Some(ScriptStep::Respond(response)) => Ok(response),
            Some(ScriptStep::FailRead) => bail!("scripted read failure"),
            _ => Ok(inner.default_response.clone()),
        }
    }
}
