use std::fmt::{Debug, Formatter};
use std::sync::{Arc, Mutex};
use anyhow::{anyhow, bail};
use tracing::{debug, trace};

use crate::radio::packet_header::PacketHeader;

/// A handler for response packets. It receives the complete response payload, including the
///  header byte.
///
/// NB: Handlers are called on the peer's scheduler task, so they should return quickly - every
///      millisecond spent here delays the next transaction with the peer
pub type ResponseHandler = Arc<dyn Fn(&[u8]) + Send + Sync>;

/// The port a handler is registered for: either a specific port, or 'greedy' for all responses
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum CallbackPort {
    Port(u8),
    Greedy,
}

/// Identifies a registered handler for removal
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct CallbackId(u64);

struct CallbackTable {
    next_id: u64,
    by_port: [Vec<(CallbackId, ResponseHandler)>; PacketHeader::NUM_PORTS as usize],
    greedy: Vec<(CallbackId, ResponseHandler)>,
}

impl CallbackTable {
    fn list_mut(&mut self, port: CallbackPort) -> anyhow::Result<&mut Vec<(CallbackId, ResponseHandler)>> {
        match port {
            CallbackPort::Port(p) => self.by_port.get_mut(p as usize)
                .ok_or_else(|| anyhow!("invalid port {} - ports range from 0 to {}", p, PacketHeader::NUM_PORTS - 1)),
            CallbackPort::Greedy => Ok(&mut self.greedy),
        }
    }
}

/// Response handlers for a single peer, dispatched in registration order
pub struct CallbackRegistry {
    table: Mutex<CallbackTable>,
}

impl Debug for CallbackRegistry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let table = self.table.lock().unwrap();
        let num_port_handlers: usize = table.by_port.iter().map(|l| l.len()).sum();
        write!(f, "CallbackRegistry{{port handlers:{}, greedy handlers:{}}}", num_port_handlers, table.greedy.len())
    }
}

impl Default for CallbackRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CallbackRegistry {
    pub fn new() -> CallbackRegistry {
        CallbackRegistry {
            table: Mutex::new(CallbackTable {
                next_id: 0,
                by_port: std::array::from_fn(|_| Vec::new()),
                greedy: Vec::new(),
            }),
        }
    }

    pub fn register(&self, port: CallbackPort, handler: ResponseHandler) -> anyhow::Result<CallbackId> {
        let mut table = self.table.lock().unwrap();
        let id = CallbackId(table.next_id);
        table.list_mut(port)?
            .push((id, handler));
        table.next_id += 1;

        debug!(?port, ?id, "registered response handler");
        Ok(id)
    }

    pub fn remove(&self, port: CallbackPort, id: CallbackId) -> anyhow::Result<()> {
        let mut table = self.table.lock().unwrap();
        let list = table.list_mut(port)?;
        match list.iter().position(|(candidate, _)| *candidate == id) {
            Some(idx) => {
                list.remove(idx);
                debug!(?port, ?id, "removed response handler");
                Ok(())
            }
            None => bail!("removing a response handler that is not registered for {:?}: {:?}", port, id),
        }
    }

    pub fn is_empty(&self) -> bool {
        let table = self.table.lock().unwrap();
        table.greedy.is_empty() && table.by_port.iter().all(|l| l.is_empty())
    }

    /// The handlers to call for a response on a given port: those registered for the port, followed
    ///  by the greedy handlers, each in registration order
    pub fn handlers_for(&self, port: u8) -> Vec<ResponseHandler> {
        let table = self.table.lock().unwrap();
        table.by_port.get(port as usize)
            .into_iter()
            .flatten()
            .chain(table.greedy.iter())
            .map(|(_, handler)| handler.clone())
            .collect()
    }

    /// Call all handlers for the response's port. The registry is not locked while handlers run,
    ///  so handlers may register or remove handlers themselves.
    ///
    /// Returns the number of handlers that were called
    pub fn dispatch(&self, port: u8, payload: &[u8]) -> usize {
        let handlers = self.handlers_for(port);
        trace!(port, num_handlers = handlers.len(), "dispatching response");
        for handler in &handlers {
            handler(payload);
        }
        handlers.len()
    }
}
