//! A simulated core: its performance model, its network model instance,
//! and its transport endpoint.
//!
//! Sending routes the packet through the core's network model and hands
//! each delivery hop to the transport, stamped with its arrival time.
//! Receiving charges the core for the time it waited: if the packet
//! arrives after the core's current time, the difference is retired as a
//! receive-stall instruction.

use std::io::{self, Write};
use std::sync::Arc;
use thiserror::Error;
use tracing::trace;

use crate::instruction::Instruction;
use crate::network::NetworkModel;
use crate::packet::{NetPacket, PacketType, PayloadTooLarge};
use crate::performance_model::{PerfModelError, PerformanceModel, Retirement};
use crate::progress_trace::CoreProgressTrace;
use crate::time::SubsecondTime;
use crate::transport::{Transport, TransportError};
use crate::types::CoreId;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    PerfModel(#[from] PerfModelError),

    #[error(transparent)]
    Payload(#[from] PayloadTooLarge),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

pub struct Core {
    id: CoreId,
    performance_model: PerformanceModel,
    network_model: Box<dyn NetworkModel>,
    transport: Arc<dyn Transport>,
    progress_trace: Option<CoreProgressTrace>,
}

impl Core {
    pub fn new(
        performance_model: PerformanceModel,
        network_model: Box<dyn NetworkModel>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            id: performance_model.core_id(),
            performance_model,
            network_model,
            transport,
            progress_trace: None,
        }
    }

    pub fn with_progress_trace(mut self, trace: CoreProgressTrace) -> Self {
        self.progress_trace = Some(trace);
        self
    }

    pub fn id(&self) -> CoreId {
        self.id
    }

    pub fn performance_model(&self) -> &PerformanceModel {
        &self.performance_model
    }

    pub fn performance_model_mut(&mut self) -> &mut PerformanceModel {
        &mut self.performance_model
    }

    pub fn network_model(&self) -> &dyn NetworkModel {
        self.network_model.as_ref()
    }

    pub fn network_model_mut(&mut self) -> &mut dyn NetworkModel {
        self.network_model.as_mut()
    }

    /// Current simulated time of this core.
    pub fn time(&self) -> SubsecondTime {
        self.performance_model.elapsed_time()
    }

    /// Retires one instruction and updates the progress trace.
    pub fn execute(&mut self, instruction: &Instruction) -> Result<Retirement, CoreError> {
        let result = self.performance_model.handle_instruction(instruction)?;
        if result.is_retired() {
            if let Some(trace) = self.progress_trace.as_mut() {
                trace.trace(self.performance_model.cycle_count())?;
            }
        }
        Ok(result)
    }

    /// Sends `data` to `receiver` at the core's current time.
    pub fn send(&mut self, packet_type: PacketType, receiver: CoreId, data: Vec<u8>) -> Result<usize, CoreError> {
        let pkt = NetPacket::new(self.time(), packet_type, self.id, receiver, data)?;
        self.send_packet(pkt)
    }

    /// Routes `pkt` and hands every delivery to the transport. Returns the
    /// number of deliveries.
    pub fn send_packet(&mut self, pkt: NetPacket) -> Result<usize, CoreError> {
        let hops = self.network_model.route_packet(&pkt);
        let mut delivered = 0;
        for hop in hops.iter().filter(|hop| hop.is_delivery()) {
            trace!(
                sender = self.id,
                receiver = hop.final_dest,
                arrival_fs = hop.time.as_fs(),
                "Packet delivered"
            );
            self.transport
                .send(hop.final_dest, pkt.delivered_to(hop.final_dest, hop.time))?;
            delivered += 1;
        }
        Ok(delivered)
    }

    /// Accepts a packet delivered to this core and charges the wait.
    pub fn deliver(&mut self, mut pkt: NetPacket) -> Result<NetPacket, CoreError> {
        self.network_model.process_received_packet(&mut pkt);

        let stall = pkt.time.saturating_sub(self.time());
        self.execute(&Instruction::recv(stall))?;
        Ok(pkt)
    }

    /// Blocks for the next packet at this core's endpoint, then delivers it.
    pub fn receive(&mut self) -> Result<NetPacket, CoreError> {
        let pkt = self.transport.recv(self.id)?;
        self.deliver(pkt)
    }

    /// Closes the progress trace.
    pub fn finish(&mut self) -> Result<(), CoreError> {
        if let Some(trace) = self.progress_trace.as_mut() {
            trace.close()?;
        }
        Ok(())
    }

    pub fn output_summary(&self, out: &mut dyn Write) -> io::Result<()> {
        writeln!(out, "Core {} Summary:", self.id)?;
        self.performance_model.output_summary(out)?;
        self.network_model.output_summary(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BusParams;
    use crate::network::{BusGlobal, NetworkModelBus};
    use crate::time::ComponentPeriod;
    use crate::transport::LocalTransport;

    fn cores(n: u32, bits_per_cycle: u64) -> Vec<Core> {
        let period = ComponentPeriod::from_ghz(1.0).unwrap();
        let bus = Arc::new(BusGlobal::new(&BusParams::new(bits_per_cycle), period).unwrap());
        let transport: Arc<dyn Transport> = Arc::new(LocalTransport::new(n, 1));
        (0..n)
            .map(|id| {
                Core::new(
                    PerformanceModel::new(id, period),
                    Box::new(NetworkModelBus::new(id, n, bus.clone())),
                    transport.clone(),
                )
            })
            .collect()
    }

    #[test]
    fn test_send_then_receive_charges_stall() {
        let mut cores = cores(2, 8);
        let (left, right) = cores.split_at_mut(1);
        let (sender, receiver) = (&mut left[0], &mut right[0]);

        sender.performance_model_mut().set_elapsed_time(SubsecondTime::from_ns(10));
        assert_eq!(sender.send(PacketType::User, 1, vec![0; 8]).unwrap(), 1);

        let pkt = receiver.receive().unwrap();
        assert_eq!(pkt.start_time, SubsecondTime::from_ns(10));
        assert_eq!(pkt.time, SubsecondTime::from_ns(18));
        assert_eq!(receiver.time(), SubsecondTime::from_ns(18));
        assert_eq!(receiver.network_model().stats().packets_received, 1);
    }

    #[test]
    fn test_late_receiver_is_not_stalled() {
        let mut cores = cores(2, 8);
        let (left, right) = cores.split_at_mut(1);
        let (sender, receiver) = (&mut left[0], &mut right[0]);

        receiver.performance_model_mut().set_elapsed_time(SubsecondTime::from_ns(100));
        sender.send(PacketType::User, 1, vec![0; 8]).unwrap();
        receiver.receive().unwrap();
        assert_eq!(receiver.time(), SubsecondTime::from_ns(100));
        // The zero-length stall still retires as an instruction.
        assert_eq!(receiver.performance_model().instruction_count(), 1);
    }

    #[test]
    fn test_broadcast_reaches_every_core() {
        let mut cores = cores(3, 8);
        let delivered = cores[0]
            .send(PacketType::User, crate::types::BROADCAST, vec![1, 2, 3, 4])
            .unwrap();
        assert_eq!(delivered, 3);
        for core in cores.iter_mut() {
            let pkt = core.receive().unwrap();
            assert_eq!(pkt.receiver, core.id());
            assert_eq!(pkt.time, SubsecondTime::from_ns(4));
        }
    }

    #[test]
    fn test_summary() {
        let cores = cores(2, 8);
        let mut out = Vec::new();
        cores[1].output_summary(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("Core 1 Summary:"));
        assert!(text.contains("Instructions: 0"));
        assert!(text.contains("Network Model (bus)"));
    }
}
