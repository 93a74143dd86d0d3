//! Packet transport between simulation threads.
//!
//! The timing core only needs reliable, ordered point-to-point delivery of
//! packets to a core's endpoint plus a barrier across all participating
//! processes. [`LocalTransport`] provides both inside a single host process,
//! with one channel per simulated core.

use crossbeam_channel::{Receiver, Sender, TryRecvError};
use std::fmt;
use std::sync::Barrier;
use thiserror::Error;

use crate::packet::NetPacket;
use crate::types::CoreId;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("no endpoint for core {0}")]
    UnknownCore(CoreId),

    #[error("endpoint of core {0} is disconnected")]
    Disconnected(CoreId),
}

pub trait Transport: Send + Sync {
    /// Delivers `pkt` to the endpoint of `receiver`.
    fn send(&self, receiver: CoreId, pkt: NetPacket) -> Result<(), TransportError>;

    /// Blocks until a packet is available at the endpoint of `core`.
    fn recv(&self, core: CoreId) -> Result<NetPacket, TransportError>;

    /// Returns a packet if one is already waiting at the endpoint of `core`.
    fn try_recv(&self, core: CoreId) -> Result<Option<NetPacket>, TransportError>;

    /// Blocks until every participating process has reached the barrier.
    fn barrier(&self);
}

/// In-process transport: one unbounded channel per core.
///
/// `num_processes` is the number of barrier participants; in-process tests
/// emulate several simulator processes by sharing one transport between
/// several thread managers.
pub struct LocalTransport {
    endpoints: Vec<(Sender<NetPacket>, Receiver<NetPacket>)>,
    barrier: Barrier,
}

impl LocalTransport {
    pub fn new(total_cores: u32, num_processes: u32) -> Self {
        Self {
            endpoints: (0..total_cores).map(|_| crossbeam_channel::unbounded()).collect(),
            barrier: Barrier::new(num_processes.max(1) as usize),
        }
    }

    fn endpoint(&self, core: CoreId) -> Result<&(Sender<NetPacket>, Receiver<NetPacket>), TransportError> {
        self.endpoints
            .get(core as usize)
            .ok_or(TransportError::UnknownCore(core))
    }

    /// Packets currently queued for `core`.
    pub fn pending(&self, core: CoreId) -> usize {
        self.endpoints.get(core as usize).map_or(0, |(_, rx)| rx.len())
    }
}

impl Transport for LocalTransport {
    fn send(&self, receiver: CoreId, pkt: NetPacket) -> Result<(), TransportError> {
        let (tx, _) = self.endpoint(receiver)?;
        tx.send(pkt).map_err(|_| TransportError::Disconnected(receiver))
    }

    fn recv(&self, core: CoreId) -> Result<NetPacket, TransportError> {
        let (_, rx) = self.endpoint(core)?;
        rx.recv().map_err(|_| TransportError::Disconnected(core))
    }

    fn try_recv(&self, core: CoreId) -> Result<Option<NetPacket>, TransportError> {
        let (_, rx) = self.endpoint(core)?;
        match rx.try_recv() {
            Ok(pkt) => Ok(Some(pkt)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(TransportError::Disconnected(core)),
        }
    }

    fn barrier(&self) {
        self.barrier.wait();
    }
}

impl fmt::Debug for LocalTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalTransport")
            .field("endpoints", &self.endpoints.len())
            .finish_non_exhaustive()
    }
}
