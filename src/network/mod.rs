//! Network models for cross-core packet timing.
//!
//! Each simulated core owns one [`NetworkModel`] instance per topology. An
//! instance turns an outgoing [`NetPacket`] into an ordered list of
//! [`Hop`]s with arrival times, consulting shared contention state for the
//! physical resources the packet crosses. Global state (the bus, the mesh
//! link queues) lives in a [`NetworkFabric`] built once per process and
//! handed to every per-core instance as an `Arc`.
//!
//! Available topologies:
//!
//! - [`NetworkModelBus`]: one shared bus, one transaction per packet.
//! - [`NetworkModelEMeshHopByHop`]: 2-D mesh, XY routing, per-link queues.
//! - [`MagicNetworkModel`]: zero latency, no contention.

pub mod bus;
pub mod emesh;
pub mod magic;

pub use bus::{BusGlobal, NetworkModelBus};
pub use emesh::{MeshFabric, MeshGeometry, NetworkModelEMeshHopByHop};
pub use magic::MagicNetworkModel;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{self, Write};
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

use crate::config::{ConfigError, ConfigResult, SimConfig};
use crate::packet::{Hop, NetPacket};
use crate::time::{ComponentPeriod, SubsecondTime};
use crate::types::CoreId;

/// Available network topologies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkModelType {
    Magic,
    Bus,
    #[serde(rename = "emesh_hop_by_hop_basic")]
    EMeshHopByHopBasic,
}

impl NetworkModelType {
    pub fn name(&self) -> &'static str {
        match self {
            NetworkModelType::Magic => "magic",
            NetworkModelType::Bus => "bus",
            NetworkModelType::EMeshHopByHopBasic => "emesh_hop_by_hop_basic",
        }
    }
}

impl fmt::Display for NetworkModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for NetworkModelType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "magic" => Ok(NetworkModelType::Magic),
            "bus" => Ok(NetworkModelType::Bus),
            "emesh_hop_by_hop_basic" => Ok(NetworkModelType::EMeshHopByHopBasic),
            other => Err(format!("unknown network model type '{}'", other)),
        }
    }
}

/// Decides, per packet, whether a packet is charged against shared network
/// resources. Packets that are not accounted are still routed, without
/// contention delay.
#[derive(Clone)]
pub struct AccountingPolicy {
    predicate: Arc<dyn Fn(&NetPacket) -> bool + Send + Sync>,
}

impl AccountingPolicy {
    /// Accounts every packet.
    pub fn all() -> Self {
        Self::from_fn(|_| true)
    }

    /// Accounts every packet that neither comes from nor goes to `core`.
    pub fn exclude_core(core: CoreId) -> Self {
        Self::from_fn(move |pkt| pkt.sender != core && pkt.receiver != core)
    }

    pub fn from_fn<F>(predicate: F) -> Self
    where
        F: Fn(&NetPacket) -> bool + Send + Sync + 'static,
    {
        Self {
            predicate: Arc::new(predicate),
        }
    }

    /// The policy selected by `network/mcp_detour`: control-plane traffic
    /// bypasses accounting when the detour is enabled.
    pub fn from_config(config: &SimConfig) -> Self {
        if config.network.mcp_detour {
            Self::exclude_core(config.mcp_core())
        } else {
            Self::all()
        }
    }

    pub fn accounts(&self, pkt: &NetPacket) -> bool {
        (self.predicate)(pkt)
    }
}

impl Default for AccountingPolicy {
    fn default() -> Self {
        Self::all()
    }
}

impl fmt::Debug for AccountingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountingPolicy").finish_non_exhaustive()
    }
}

/// Per-instance traffic counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkStats {
    pub packets_sent: u64,
    pub bytes_sent: u64,
    pub packets_received: u64,
    pub bytes_received: u64,
    /// Sum over received packets of arrival time minus injection time.
    pub total_packet_latency: SubsecondTime,
}

impl NetworkStats {
    pub fn record_sent(&mut self, pkt: &NetPacket) {
        self.packets_sent += 1;
        self.bytes_sent += u64::from(pkt.length);
    }

    pub fn record_received(&mut self, pkt: &NetPacket) {
        self.packets_received += 1;
        self.bytes_received += u64::from(pkt.length);
        self.total_packet_latency += pkt.time.saturating_sub(pkt.start_time);
    }

    pub fn average_packet_latency(&self) -> SubsecondTime {
        if self.packets_received == 0 {
            SubsecondTime::ZERO
        } else {
            SubsecondTime::from_fs(self.total_packet_latency.as_fs() / self.packets_received)
        }
    }

    /// Writes the counters as indented `Key: value` lines.
    pub fn write_summary(&self, out: &mut dyn Write) -> io::Result<()> {
        writeln!(out, "    Packets Sent: {}", self.packets_sent)?;
        writeln!(out, "    Bytes Sent: {}", self.bytes_sent)?;
        writeln!(out, "    Packets Received: {}", self.packets_received)?;
        writeln!(out, "    Bytes Received: {}", self.bytes_received)?;
        writeln!(
            out,
            "    Average Packet Latency (ns): {}",
            self.average_packet_latency().as_ns()
        )
    }
}

/// Per-core timing model of one network topology.
pub trait NetworkModel: Send {
    fn model_type(&self) -> NetworkModelType;

    /// Routes a packet injected at `pkt.time`, returning its hops in order.
    ///
    /// A hop whose `next_dest` equals its `final_dest` is a delivery; its
    /// time is the arrival time at that core. Broadcast packets yield one
    /// delivery per core.
    fn route_packet(&mut self, pkt: &NetPacket) -> Vec<Hop>;

    /// Receiver-side bookkeeping for a delivered packet.
    fn process_received_packet(&mut self, pkt: &mut NetPacket);

    fn output_summary(&self, out: &mut dyn Write) -> io::Result<()>;

    fn enable(&mut self);

    fn disable(&mut self);

    fn is_enabled(&self) -> bool;

    fn stats(&self) -> NetworkStats;
}

/// Process-wide network state shared by all per-core model instances.
///
/// Only the structures of configured topologies are built; asking for an
/// instance of an unconfigured topology is a configuration error.
#[derive(Clone, Debug)]
pub struct NetworkFabric {
    total_cores: u32,
    period: ComponentPeriod,
    policy: AccountingPolicy,
    bus: Option<Arc<BusGlobal>>,
    mesh: Option<Arc<MeshFabric>>,
}

impl NetworkFabric {
    pub fn from_config(config: &SimConfig) -> ConfigResult<Self> {
        let period = config.core_domain()?;
        let total_cores = config.total_cores();

        let bus = match &config.network.bus {
            Some(params) => Some(Arc::new(BusGlobal::new(params, period)?)),
            None => None,
        };
        let mesh = match &config.network.emesh_hop_by_hop_basic {
            Some(params) => Some(Arc::new(MeshFabric::new(total_cores, params, period)?)),
            None => None,
        };

        info!(
            total_cores,
            user = %config.network.user,
            bus = bus.is_some(),
            mesh = mesh.is_some(),
            "Network fabric created"
        );

        Ok(Self {
            total_cores,
            period,
            policy: AccountingPolicy::from_config(config),
            bus,
            mesh,
        })
    }

    /// Replaces the accounting policy handed to new instances.
    pub fn with_policy(mut self, policy: AccountingPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn total_cores(&self) -> u32 {
        self.total_cores
    }

    pub fn bus(&self) -> Option<&Arc<BusGlobal>> {
        self.bus.as_ref()
    }

    pub fn mesh(&self) -> Option<&Arc<MeshFabric>> {
        self.mesh.as_ref()
    }

    /// Creates the per-core instance of the given topology.
    pub fn create_model(
        &self,
        model_type: NetworkModelType,
        core_id: CoreId,
    ) -> ConfigResult<Box<dyn NetworkModel>> {
        if core_id >= self.total_cores {
            return Err(ConfigError::Validation(format!(
                "core {} out of range for {} cores",
                core_id, self.total_cores
            )));
        }

        match model_type {
            NetworkModelType::Magic => Ok(Box::new(MagicNetworkModel::new(core_id, self.total_cores))),
            NetworkModelType::Bus => {
                let bus = self
                    .bus
                    .clone()
                    .ok_or_else(|| ConfigError::MissingParameter("network/bus".to_string()))?;
                Ok(Box::new(
                    NetworkModelBus::new(core_id, self.total_cores, bus)
                        .with_policy(self.policy.clone()),
                ))
            }
            NetworkModelType::EMeshHopByHopBasic => {
                let mesh = self.mesh.clone().ok_or_else(|| {
                    ConfigError::MissingParameter("network/emesh_hop_by_hop_basic".to_string())
                })?;
                Ok(Box::new(
                    NetworkModelEMeshHopByHop::new(core_id, mesh, self.period)
                        .with_policy(self.policy.clone()),
                ))
            }
        }
    }

    /// Creates an instance from a topology name such as `"bus"`.
    pub fn create_model_by_name(
        &self,
        name: &str,
        core_id: CoreId,
    ) -> ConfigResult<Box<dyn NetworkModel>> {
        let model_type = name.parse().map_err(|reason| ConfigError::InvalidParameter {
            key: "network/user".to_string(),
            reason,
        })?;
        self.create_model(model_type, core_id)
    }

    /// Writes the shared-resource statistics of every configured topology.
    pub fn output_summary(&self, out: &mut dyn Write) -> io::Result<()> {
        if let Some(bus) = &self.bus {
            bus.output_summary(out)?;
        }
        if let Some(mesh) = &self.mesh {
            mesh.output_summary(out)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BusParams, EMeshParams, SimConfigBuilder};
    use crate::packet::PacketType;

    #[test]
    fn test_model_type_parse() {
        assert_eq!("bus".parse::<NetworkModelType>(), Ok(NetworkModelType::Bus));
        assert_eq!(
            "EMESH_HOP_BY_HOP_BASIC".parse::<NetworkModelType>(),
            Ok(NetworkModelType::EMeshHopByHopBasic)
        );
        assert!("atac".parse::<NetworkModelType>().is_err());
    }

    #[test]
    fn test_accounting_policy() {
        let pkt = |s, r| NetPacket::sized(SubsecondTime::ZERO, PacketType::User, s, r, 8);

        let all = AccountingPolicy::all();
        assert!(all.accounts(&pkt(0, 3)));

        let detour = AccountingPolicy::exclude_core(3);
        assert!(detour.accounts(&pkt(0, 1)));
        assert!(!detour.accounts(&pkt(0, 3)));
        assert!(!detour.accounts(&pkt(3, 0)));

        let big_only = AccountingPolicy::from_fn(|p| p.length > 4);
        assert!(big_only.accounts(&pkt(0, 1)));
    }

    #[test]
    fn test_policy_from_config() {
        let config = SimConfigBuilder::new(4).mcp_detour(true).build().unwrap();
        let policy = AccountingPolicy::from_config(&config);
        let to_mcp = NetPacket::sized(SubsecondTime::ZERO, PacketType::McpRequest, 0, 3, 8);
        assert!(!policy.accounts(&to_mcp));
    }

    #[test]
    fn test_fabric_builds_configured_topologies() {
        let config = SimConfigBuilder::new(4)
            .bus(BusParams::new(64))
            .build()
            .unwrap();
        let fabric = NetworkFabric::from_config(&config).unwrap();

        assert!(fabric.bus().is_some());
        assert!(fabric.mesh().is_none());
        assert_eq!(
            fabric.create_model_by_name("bus", 0).unwrap().model_type(),
            NetworkModelType::Bus
        );
        assert!(matches!(
            fabric.create_model(NetworkModelType::EMeshHopByHopBasic, 0),
            Err(ConfigError::MissingParameter(_))
        ));
        assert!(fabric.create_model(NetworkModelType::Bus, 4).is_err());
        assert!(fabric.create_model_by_name("ring", 0).is_err());
    }

    #[test]
    fn test_fabric_mesh_instances_share_links() {
        let config = SimConfigBuilder::new(4)
            .emesh(EMeshParams::new(8, 1))
            .build()
            .unwrap();
        let fabric = NetworkFabric::from_config(&config).unwrap();
        let mut a = fabric.create_model(NetworkModelType::EMeshHopByHopBasic, 0).unwrap();
        let mut b = fabric.create_model(NetworkModelType::EMeshHopByHopBasic, 0).unwrap();

        let pkt = NetPacket::sized(SubsecondTime::ZERO, PacketType::User, 0, 1, 8);
        let first = a.route_packet(&pkt);
        let second = b.route_packet(&pkt);
        assert!(second[0].time > first[0].time);
    }

    #[test]
    fn test_network_stats_latency() {
        let mut stats = NetworkStats::default();
        let mut pkt = NetPacket::sized(SubsecondTime::from_ns(10), PacketType::User, 0, 1, 4);
        pkt.time = SubsecondTime::from_ns(30);
        stats.record_received(&pkt);
        assert_eq!(stats.average_packet_latency(), SubsecondTime::from_ns(20));
        assert_eq!(stats.bytes_received, 4);
    }
}
