//! Shared-bus network model.
//!
//! All cores share one physical bus. A packet occupies the bus for
//! `length / bandwidth` (rounded up to whole cycles), and transactions are
//! serialized through the bus's queue model. A broadcast is a single bus
//! transaction that every core observes at the same time.

use parking_lot::Mutex;
use std::fmt;
use std::io::{self, Write};
use std::sync::Arc;
use tracing::debug;

use super::{AccountingPolicy, NetworkModel, NetworkModelType, NetworkStats};
use crate::config::{BusParams, ConfigError, ConfigResult};
use crate::packet::{Hop, NetPacket};
use crate::queue_model::{create_queue_model, QueueModel, QueueStats};
use crate::time::{ComponentBandwidthPerCycle, ComponentPeriod, SubsecondTime};
use crate::types::CoreId;

/// State of the physical bus, shared by every core's [`NetworkModelBus`].
pub struct BusGlobal {
    bandwidth: ComponentBandwidthPerCycle,
    contention_enabled: bool,
    queue: Mutex<Box<dyn QueueModel>>,
}

impl BusGlobal {
    pub fn new(params: &BusParams, period: ComponentPeriod) -> ConfigResult<Self> {
        let bandwidth = ComponentBandwidthPerCycle::new(period, params.bandwidth).ok_or_else(|| {
            ConfigError::InvalidParameter {
                key: "network/bus/bandwidth".to_string(),
                reason: "bandwidth must be positive".to_string(),
            }
        })?;

        debug!(
            bits_per_cycle = params.bandwidth,
            queue_model = %params.queue_model.model_type,
            "Bus created"
        );

        Ok(Self {
            bandwidth,
            contention_enabled: params.queue_model.enabled,
            queue: Mutex::new(create_queue_model(params.queue_model.model_type, bandwidth)),
        })
    }

    /// Occupies the bus for a `length`-byte transfer requested at `start`
    /// and returns the completion time.
    ///
    /// With contention disabled the transfer time is still charged but the
    /// bus never queues.
    pub fn use_bus(&self, start: SubsecondTime, length: u32) -> SubsecondTime {
        if !self.contention_enabled {
            return start + self.bandwidth.rounded_latency(u64::from(length) * 8);
        }
        self.queue.lock().reserve(start, u64::from(length))
    }

    pub fn bandwidth(&self) -> ComponentBandwidthPerCycle {
        self.bandwidth
    }

    pub fn stats(&self) -> QueueStats {
        *self.queue.lock().stats()
    }

    pub fn output_summary(&self, out: &mut dyn Write) -> io::Result<()> {
        let stats = self.stats();
        writeln!(out, "Bus Summary:")?;
        writeln!(out, "  Bandwidth (bits/cycle): {}", self.bandwidth.bits_per_cycle())?;
        writeln!(out, "  Num Packets: {}", stats.packets)?;
        writeln!(out, "  Num Packets Delayed: {}", stats.delayed_packets)?;
        writeln!(out, "  Num Bytes: {}", stats.bytes)?;
        writeln!(out, "  Time Used (ns): {}", stats.busy_time.as_ns())?;
        writeln!(out, "  Total Delay (ns): {}", stats.total_delay.as_ns())?;
        writeln!(out, "  Average Delay (ns): {}", stats.average_delay().as_ns())
    }
}

impl fmt::Debug for BusGlobal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BusGlobal")
            .field("bandwidth", &self.bandwidth)
            .field("contention_enabled", &self.contention_enabled)
            .finish_non_exhaustive()
    }
}

/// Per-core view of the shared bus.
#[derive(Debug)]
pub struct NetworkModelBus {
    core_id: CoreId,
    total_cores: u32,
    bus: Arc<BusGlobal>,
    enabled: bool,
    policy: AccountingPolicy,
    stats: NetworkStats,
}

impl NetworkModelBus {
    pub fn new(core_id: CoreId, total_cores: u32, bus: Arc<BusGlobal>) -> Self {
        Self {
            core_id,
            total_cores,
            bus,
            enabled: true,
            policy: AccountingPolicy::all(),
            stats: NetworkStats::default(),
        }
    }

    pub fn with_policy(mut self, policy: AccountingPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn core_id(&self) -> CoreId {
        self.core_id
    }

    pub fn bus(&self) -> &Arc<BusGlobal> {
        &self.bus
    }
}

impl NetworkModel for NetworkModelBus {
    fn model_type(&self) -> NetworkModelType {
        NetworkModelType::Bus
    }

    fn route_packet(&mut self, pkt: &NetPacket) -> Vec<Hop> {
        self.stats.record_sent(pkt);

        let time = if self.enabled && self.policy.accounts(pkt) {
            self.bus.use_bus(pkt.time, pkt.length)
        } else {
            pkt.time
        };

        if pkt.is_broadcast() {
            (0..self.total_cores)
                .map(|core| Hop::new(core, core, time))
                .collect()
        } else {
            vec![Hop::new(pkt.receiver, pkt.receiver, time)]
        }
    }

    fn process_received_packet(&mut self, pkt: &mut NetPacket) {
        self.stats.record_received(pkt);
    }

    fn output_summary(&self, out: &mut dyn Write) -> io::Result<()> {
        writeln!(out, "  Network Model (bus), core {}:", self.core_id)?;
        writeln!(out, "    Enabled: {}", self.enabled)?;
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
