//! Zero-latency network.
//!
//! Delivers every packet at its injection time. Used for control traffic
//! and for runs that do not model the interconnect.

use std::io::{self, Write};

use super::{NetworkModel, NetworkModelType, NetworkStats};
use crate::packet::{Hop, NetPacket};
use crate::types::CoreId;

#[derive(Debug)]
pub struct MagicNetworkModel {
    core_id: CoreId,
    total_cores: u32,
    enabled: bool,
    stats: NetworkStats,
}

impl MagicNetworkModel {
    pub fn new(core_id: CoreId, total_cores: u32) -> Self {
        Self {
            core_id,
            total_cores,
            enabled: true,
            stats: NetworkStats::default(),
        }
    }
}

impl NetworkModel for MagicNetworkModel {
    fn model_type(&self) -> NetworkModelType {
        NetworkModelType::Magic
    }

    fn route_packet(&mut self, pkt: &NetPacket) -> Vec<Hop> {
        self.stats.record_sent(pkt);
        if pkt.is_broadcast() {
            (0..self.total_cores)
                .map(|core| Hop::new(core, core, pkt.time))
                .collect()
        } else {
            vec![Hop::new(pkt.receiver, pkt.receiver, pkt.time)]
        }
    }

    fn process_received_packet(&mut self, pkt: &mut NetPacket) {
        self.stats.record_received(pkt);
    }

    fn output_summary(&self, out: &mut dyn Write) -> io::Result<()> {
        writeln!(out, "  Network Model (magic), core {}:", self.core_id)?;
        self.stats.write_summary(out)
    }

    fn enable(&mut self) {
        self.enabled = true;
    }

    fn disable(&mut self) {
        self.enabled = false;
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn stats(&self) -> NetworkStats {
        self.stats
    }
}
