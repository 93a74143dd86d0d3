//! Network packets and routed hops.
//!
//! Packets are the unit of cross-core communication. Every packet carries
//! the simulated time at which it is (currently) in flight; network models
//! turn a packet into a list of [`Hop`]s, each stamped with an arrival time.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::time::SubsecondTime;
use crate::types::{CoreId, BROADCAST};

/// The type of a packet.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PacketType {
    /// Application-level message between cores.
    User,
    /// Shared-memory request/response traffic.
    SharedMem,
    /// Request to the control-plane core.
    McpRequest,
    /// Response from the control-plane core.
    McpResponse,
    /// Tells a core's simulation thread to exit its loop.
    SimThreadTerminateThreads,
    /// Tells a core's performance-model thread to exit its loop.
    CoreThreadTerminateThreads,
}

impl PacketType {
    /// Returns true for the thread-lifecycle control packets.
    pub fn is_termination(&self) -> bool {
        matches!(
            self,
            PacketType::SimThreadTerminateThreads | PacketType::CoreThreadTerminateThreads
        )
    }
}

/// A packet in flight between two cores.
/// A payload too long for the 32-bit wire length.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("payload of {0} bytes exceeds the maximum packet length")]
pub struct PayloadTooLarge(pub usize);

/// Wire length of a payload of `len` bytes.
pub fn wire_length(len: usize) -> Result<u32, PayloadTooLarge> {
    u32::try_from(len).map_err(|_| PayloadTooLarge(len))
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetPacket {
    /// Current simulated time of the packet (send time until routed, arrival
    /// time once delivered).
    pub time: SubsecondTime,
    /// Time at which the sender injected the packet. Never rewritten.
    pub start_time: SubsecondTime,
    pub packet_type: PacketType,
    pub sender: CoreId,
    pub receiver: CoreId,
    /// Payload length in bytes, as charged by the network.
    pub length: u32,
    pub data: Vec<u8>,
}

impl NetPacket {
    /// Creates a packet; `length` is taken from the payload.
    pub fn new(
        time: SubsecondTime,
        packet_type: PacketType,
        sender: CoreId,
        receiver: CoreId,
        data: Vec<u8>,
    ) -> Result<Self, PayloadTooLarge> {
        Ok(Self {
            time,
            start_time: time,
            packet_type,
            sender,
            receiver,
            length: wire_length(data.len())?,
            data,
        })
    }

    /// Creates a payload-less packet that still occupies `length` bytes on
    /// the wire.
    pub fn sized(
        time: SubsecondTime,
        packet_type: PacketType,
        sender: CoreId,
        receiver: CoreId,
        length: u32,
    ) -> Self {
        Self {
            time,
            start_time: time,
            packet_type,
            sender,
            receiver,
            length,
            data: Vec::new(),
        }
    }

    /// Creates a zero-length lifecycle control packet addressed to `receiver`.
    pub fn control(packet_type: PacketType, receiver: CoreId) -> Self {
        Self::sized(SubsecondTime::ZERO, packet_type, 0, receiver, 0)
    }

    pub fn is_broadcast(&self) -> bool {
        self.receiver == BROADCAST
    }

    /// Length on the wire in bits.
    pub fn length_bits(&self) -> u64 {
        u64::from(self.length) * 8
    }

    /// Returns a copy of this packet addressed to `receiver`, arriving at
    /// `time`. Used for broadcast fan-out and hop delivery.
    pub fn delivered_to(&self, receiver: CoreId, time: SubsecondTime) -> NetPacket {
        NetPacket {
            time,
            receiver,
            ..self.clone()
        }
    }
}

/// One link traversal in a routed path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hop {
    /// The core the packet is ultimately addressed to on this path.
    pub final_dest: CoreId,
    /// The core reached by this hop.
    pub next_dest: CoreId,
    /// Arrival time at `next_dest`.
    pub time: SubsecondTime,
}

impl Hop {
    pub fn new(final_dest: CoreId, next_dest: CoreId, time: SubsecondTime) -> Self {
        Self {
            final_dest,
            next_dest,
            time,
        }
    }

    /// True when this hop reaches the packet's final destination.
    pub fn is_delivery(&self) -> bool {
        self.final_dest == self.next_dest
    }
}
