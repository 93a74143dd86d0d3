//! Electrical mesh with hop-by-hop timing.
//!
//! Cores sit on a 2-D grid, `width = floor(sqrt(N))` columns and
//! `height = ceil(N / width)` rows, core `i` at `(i % width, i / width)`.
//! Packets follow dimension-ordered routing: along the row first, then
//! along the column. When the last row is only partly populated and the
//! row-first corner does not exist, the column is taken first instead.
//!
//! Each hop costs the configured hop latency. With queue modeling enabled
//! every router output port also has a queue model, and a packet first
//! waits for and occupies the outgoing link before paying the hop latency.
//! With queue modeling disabled the model is a plain hop counter.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::io::{self, Write};
use std::sync::Arc;
use tracing::debug;

use super::{AccountingPolicy, NetworkModel, NetworkModelType, NetworkStats};
use crate::config::{ConfigError, ConfigResult, EMeshParams};
use crate::packet::{Hop, NetPacket};
use crate::queue_model::{create_queue_model, QueueModel, QueueStats};
use crate::time::{ComponentBandwidthPerCycle, ComponentLatency, ComponentPeriod, SubsecondTime};
use crate::types::CoreId;

/// Router output port.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    Left,
    Right,
    Down,
    Up,
}

impl Direction {
    const ALL: [Direction; 4] = [Direction::Left, Direction::Right, Direction::Down, Direction::Up];

    fn index(self) -> usize {
        match self {
            Direction::Left => 0,
            Direction::Right => 1,
            Direction::Down => 2,
            Direction::Up => 3,
        }
    }
}

/// Placement of cores on the mesh.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MeshGeometry {
    total_cores: u32,
    width: u32,
    height: u32,
}

impl MeshGeometry {
    pub fn new(total_cores: u32) -> Self {
        assert!(total_cores > 0, "mesh needs at least one core");
        let width = (total_cores as f64).sqrt().floor() as u32;
        // Guard against sqrt rounding below the true root.
        let width = if (width + 1) * (width + 1) <= total_cores {
            width + 1
        } else {
            width.max(1)
        };
        let height = total_cores.div_ceil(width);
        Self {
            total_cores,
            width,
            height,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn total_cores(&self) -> u32 {
        self.total_cores
    }

    /// `(x, y)` position of a core.
    pub fn position(&self, core: CoreId) -> (u32, u32) {
        (core % self.width, core / self.width)
    }

    /// Core at `(x, y)`, if that grid slot is populated.
    pub fn core_at(&self, x: u32, y: u32) -> Option<CoreId> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let core = y * self.width + x;
        (core < self.total_cores).then_some(core)
    }

    /// Number of links between two cores.
    pub fn distance(&self, from: CoreId, to: CoreId) -> u32 {
        let (sx, sy) = self.position(from);
        let (dx, dy) = self.position(to);
        sx.abs_diff(dx) + sy.abs_diff(dy)
    }

    fn step(&self, core: CoreId, dir: Direction) -> CoreId {
        let (x, y) = self.position(core);
        let (nx, ny) = match dir {
            Direction::Left => (x - 1, y),
            Direction::Right => (x + 1, y),
            Direction::Down => (x, y - 1),
            Direction::Up => (x, y + 1),
        };
        ny * self.width + nx
    }

    /// The links `(router, output port)` a packet crosses from `from` to
    /// `to`, in order.
    pub fn route(&self, from: CoreId, to: CoreId) -> Vec<(CoreId, Direction)> {
        let (sx, sy) = self.position(from);
        let (dx, dy) = self.position(to);

        let x_dir = if dx > sx { Direction::Right } else { Direction::Left };
        let y_dir = if dy > sy { Direction::Up } else { Direction::Down };
        let x_steps = sx.abs_diff(dx);
        let y_steps = sy.abs_diff(dy);

        let row_first = self.core_at(dx, sy).is_some();
        let legs = if row_first {
            [(x_dir, x_steps), (y_dir, y_steps)]
        } else {
            [(y_dir, y_steps), (x_dir, x_steps)]
        };

        let mut links = Vec::with_capacity((x_steps + y_steps) as usize);
        let mut cur = from;
        for (dir, steps) in legs {
            for _ in 0..steps {
                links.push((cur, dir));
                cur = self.step(cur, dir);
            }
        }
        links
    }
}

/// Link queues of the whole mesh, shared by every core's model instance.
pub struct MeshFabric {
    geometry: MeshGeometry,
    params: EMeshParams,
    /// One queue per (router, output port); empty when queue modeling is off.
    links: Vec<Mutex<Box<dyn QueueModel>>>,
}

impl MeshFabric {
    pub fn new(total_cores: u32, params: &EMeshParams, period: ComponentPeriod) -> ConfigResult<Self> {
        if total_cores == 0 {
            return Err(ConfigError::Validation("mesh needs at least one core".to_string()));
        }
        let bandwidth = ComponentBandwidthPerCycle::new(period, params.link_bandwidth).ok_or_else(|| {
            ConfigError::InvalidParameter {
                key: "network/emesh_hop_by_hop_basic/link_bandwidth".to_string(),
                reason: "bandwidth must be positive".to_string(),
            }
        })?;

        let geometry = MeshGeometry::new(total_cores);
        let links = if params.queue_model.enabled {
            (0..total_cores as usize * Direction::ALL.len())
                .map(|_| Mutex::new(create_queue_model(params.queue_model.model_type, bandwidth)))
                .collect()
        } else {
            Vec::new()
        };

        debug!(
            total_cores,
            width = geometry.width(),
            height = geometry.height(),
            link_bandwidth = params.link_bandwidth,
            hop_latency = params.hop_latency,
            queue_model = params.queue_model.enabled,
            "Mesh fabric created"
        );

        Ok(Self {
            geometry,
            params: *params,
            links,
        })
    }

    pub fn geometry(&self) -> &MeshGeometry {
        &self.geometry
    }

    pub fn params(&self) -> &EMeshParams {
        &self.params
    }

    pub fn queue_model_enabled(&self) -> bool {
        !self.links.is_empty()
    }

    /// Occupies the output link `dir` of `router` for a `bytes`-byte
    /// transfer requested at `start`; returns the time the transfer leaves
    /// the link. Without queue modeling the link is free and instantaneous.
    pub fn use_link(&self, router: CoreId, dir: Direction, start: SubsecondTime, bytes: u64) -> SubsecondTime {
        match self.links.get(router as usize * Direction::ALL.len() + dir.index()) {
            Some(queue) => queue.lock().reserve(start, bytes),
            None => start,
        }
    }

    /// Queue statistics summed over all links.
    pub fn link_stats(&self) -> QueueStats {
        let mut total = QueueStats::default();
        for link in &self.links {
            let stats = *link.lock().stats();
            total.packets += stats.packets;
            total.delayed_packets += stats.delayed_packets;
            total.bytes += stats.bytes;
            total.busy_time += stats.busy_time;
            total.total_delay += stats.total_delay;
        }
        total
    }

    pub fn output_summary(&self, out: &mut dyn Write) -> io::Result<()> {
        writeln!(out, "Mesh Summary:")?;
        writeln!(out, "  Dimensions: {}x{}", self.geometry.width(), self.geometry.height())?;
        writeln!(out, "  Link Bandwidth (bits/cycle): {}", self.params.link_bandwidth)?;
        writeln!(out, "  Hop Latency (cycles): {}", self.params.hop_latency)?;
        writeln!(out, "  Queue Model Enabled: {}", self.queue_model_enabled())?;
        if self.queue_model_enabled() {
            let stats = self.link_stats();
            writeln!(out, "  Link Traversals: {}", stats.packets)?;
            writeln!(out, "  Link Traversals Delayed: {}", stats.delayed_packets)?;
            writeln!(out, "  Total Queue Delay (ns): {}", stats.total_delay.as_ns())?;
        }
        Ok(())
    }
}

impl fmt::Debug for MeshFabric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MeshFabric")
            .field("geometry", &self.geometry)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

/// Per-core E-Mesh model instance.
#[derive(Debug)]
pub struct NetworkModelEMeshHopByHop {
    core_id: CoreId,
    fabric: Arc<MeshFabric>,
    hop_latency: ComponentLatency,
    enabled: bool,
    policy: AccountingPolicy,
    stats: NetworkStats,
}

impl NetworkModelEMeshHopByHop {
    pub fn new(core_id: CoreId, fabric: Arc<MeshFabric>, period: ComponentPeriod) -> Self {
        let hop_latency = ComponentLatency::new(period, fabric.params().hop_latency);
        Self {
            core_id,
            fabric,
            hop_latency,
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

    fn traverse(&self, router: CoreId, dir: Direction, start: SubsecondTime, bytes: u64, account: bool) -> SubsecondTime {
        let leave = if account {
            self.fabric.use_link(router, dir, start, bytes)
        } else {
            start
        };
        leave + self.hop_latency.latency()
    }

    fn route_unicast(&self, pkt: &NetPacket, dest: CoreId, account: bool, hops: &mut Vec<Hop>) {
        let geometry = self.fabric.geometry();
        let bytes = u64::from(pkt.length);
        let mut time = pkt.time;

        if dest == self.core_id {
            hops.push(Hop::new(dest, dest, time));
            return;
        }
        for (router, dir) in geometry.route(self.core_id, dest) {
            time = self.traverse(router, dir, time, bytes, account);
            hops.push(Hop::new(dest, geometry.step(router, dir), time));
        }
    }

    /// Broadcast over the dimension-ordered spanning tree rooted at this
    /// core; every link of the tree is charged once.
    fn route_broadcast_tree(&self, pkt: &NetPacket, account: bool, hops: &mut Vec<Hop>) {
        let geometry = self.fabric.geometry();
        let bytes = u64::from(pkt.length);
        let mut crossed: HashMap<(CoreId, Direction), SubsecondTime> = HashMap::new();

        for dest in 0..geometry.total_cores() {
            let mut time = pkt.time;
            for link in geometry.route(self.core_id, dest) {
                time = match crossed.get(&link) {
                    Some(t) => *t,
                    None => {
                        let t = self.traverse(link.0, link.1, time, bytes, account);
                        crossed.insert(link, t);
                        t
                    }
                };
            }
            hops.push(Hop::new(dest, dest, time));
        }
    }
}

impl NetworkModel for NetworkModelEMeshHopByHop {
    fn model_type(&self) -> NetworkModelType {
        NetworkModelType::EMeshHopByHopBasic
    }

    fn route_packet(&mut self, pkt: &NetPacket) -> Vec<Hop> {
        self.stats.record_sent(pkt);

        let geometry = *self.fabric.geometry();
        if !self.enabled {
            return if pkt.is_broadcast() {
                (0..geometry.total_cores())
                    .map(|core| Hop::new(core, core, pkt.time))
                    .collect()
            } else {
                vec![Hop::new(pkt.receiver, pkt.receiver, pkt.time)]
            };
        }

        let account = self.policy.accounts(pkt);
        let mut hops = Vec::new();

        if !pkt.is_broadcast() {
            self.route_unicast(pkt, pkt.receiver, account, &mut hops);
        } else if self.fabric.params().broadcast_tree_enabled {
            self.route_broadcast_tree(pkt, account, &mut hops);
        } else {
            for dest in 0..geometry.total_cores() {
                self.route_unicast(pkt, dest, account, &mut hops);
            }
        }
        hops
    }

    fn process_received_packet(&mut self, pkt: &mut NetPacket) {
        self.stats.record_received(pkt);
    }

    fn output_summary(&self, out: &mut dyn Write) -> io::Result<()> {
        writeln!(out, "  Network Model (emesh_hop_by_hop_basic), core {}:", self.core_id)?;
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
