//! End-of-run statistics.
//!
//! A [`StatsRecorder`] runs alongside a simulation and, once the run is
//! over, snapshots every local core and the shared network resources into
//! a [`SimulationStats`]. The snapshot serializes to JSON, flattens to CSV
//! (one file of run-level metrics, one of per-core counters), and renders a
//! plain-text report.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::Path;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use crate::branch_predictor::BranchPredictorStats;
use crate::config::SimConfig;
use crate::network::{NetworkFabric, NetworkModelType, NetworkStats};
use crate::queue_model::QueueStats;
use crate::sim_core::Core;
use crate::types::{CoreId, ProcessId};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SimulationStats {
    pub run: RunInfo,

    /// Local cores, keyed by id.
    pub cores: BTreeMap<CoreId, CoreStats>,

    /// Shared bus queue, when a bus is configured.
    pub bus: Option<QueueStats>,

    /// All mesh link queues summed, when the mesh models queueing.
    pub mesh_links: Option<QueueStats>,

    pub host: HostStats,
}

/// What was simulated, and when.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RunInfo {
    pub label: String,
    pub version: String,
    pub network: Option<NetworkModelType>,
    pub total_cores: u32,
    pub process: ProcessId,
    pub started_unix_secs: Option<u64>,
    pub finished_unix_secs: Option<u64>,
}

/// Counters of one simulated core.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CoreStats {
    pub core_id: CoreId,
    pub instructions: u64,
    pub cycles: u64,
    pub time_ns: u64,
    pub network: NetworkStats,
    pub branch_predictor: Option<BranchPredictorStats>,
}

/// How fast the host ran the simulation.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct HostStats {
    pub wall_time_ms: f64,
    /// Furthest simulated time reached by any local core.
    pub simulated_time_ns: u64,
    pub simulated_ns_per_second: f64,
    pub instructions_per_second: f64,
}

impl SimulationStats {
    pub fn new() -> Self {
        Self {
            run: RunInfo {
                version: env!("CARGO_PKG_VERSION").to_string(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Stats pre-filled with the run description of `config`.
    pub fn for_config(config: &SimConfig) -> Self {
        let mut stats = Self::new();
        stats.run.network = Some(config.network.user);
        stats.run.total_cores = config.total_cores();
        stats.run.process = config.general.current_process;
        stats
    }

    pub fn labelled(mut self, label: impl Into<String>) -> Self {
        self.run.label = label.into();
        self
    }

    pub fn record_core(&mut self, core: &Core) {
        let perf = core.performance_model();
        let summary = perf.summary();
        self.cores.insert(
            core.id(),
            CoreStats {
                core_id: core.id(),
                instructions: summary.instructions,
                cycles: summary.cycles,
                time_ns: summary.time_ns,
                network: core.network_model().stats(),
                branch_predictor: perf.branch_predictor().map(|bp| bp.stats()),
            },
        );
    }

    pub fn record_fabric(&mut self, fabric: &NetworkFabric) {
        self.bus = fabric.bus().map(|bus| bus.stats());
        self.mesh_links = fabric
            .mesh()
            .filter(|mesh| mesh.queue_model_enabled())
            .map(|mesh| mesh.link_stats());
    }

    pub fn total_instructions(&self) -> u64 {
        self.cores.values().map(|c| c.instructions).sum()
    }

    pub fn total_packets_sent(&self) -> u64 {
        self.cores.values().map(|c| c.network.packets_sent).sum()
    }

    /// Derives the host-side rates from the recorded cores and the wall
    /// time the run took.
    pub fn finalize(&mut self, wall_time_ms: f64) {
        let simulated = self.cores.values().map(|c| c.time_ns).max().unwrap_or(0);
        let secs = wall_time_ms / 1000.0;
        let per_sec = |count: u64| if secs > 0.0 { count as f64 / secs } else { 0.0 };

        self.host = HostStats {
            wall_time_ms,
            simulated_time_ns: simulated,
            simulated_ns_per_second: per_sec(simulated),
            instructions_per_second: per_sec(self.total_instructions()),
        };
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn write_json<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let json = self.to_json().map_err(io::Error::other)?;
        std::fs::write(path, json)
    }

    /// Run-level metrics as `metric,value` rows.
    pub fn to_csv(&self) -> String {
        let mut rows: Vec<(&str, String)> = vec![
            ("cores", self.cores.len().to_string()),
            ("instructions", self.total_instructions().to_string()),
            ("packets_sent", self.total_packets_sent().to_string()),
            ("simulated_time_ns", self.host.simulated_time_ns.to_string()),
        ];
        if let Some(bus) = &self.bus {
            rows.extend(queue_rows(["bus_packets", "bus_packets_delayed", "bus_total_delay_ns"], bus));
        }
        if let Some(links) = &self.mesh_links {
            rows.extend(queue_rows(
                ["mesh_link_traversals", "mesh_link_traversals_delayed", "mesh_link_total_delay_ns"],
                links,
            ));
        }
        rows.push(("wall_time_ms", format!("{:.2}", self.host.wall_time_ms)));
        rows.push(("simulated_ns_per_second", format!("{:.2}", self.host.simulated_ns_per_second)));
        rows.push(("instructions_per_second", format!("{:.2}", self.host.instructions_per_second)));

        let mut csv = String::from("metric,value\n");
        for (metric, value) in rows {
            csv.push_str(metric);
            csv.push(',');
            csv.push_str(&value);
            csv.push('\n');
        }
        csv
    }

    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        std::fs::write(path, self.to_csv())
    }

    /// One row per core.
    pub fn cores_csv(&self) -> String {
        let mut csv = String::from(
            "core,instructions,cycles,time_ns,packets_sent,packets_received,avg_packet_latency_ns\n",
        );
        for core in self.cores.values() {
            let net = &core.network;
            csv.push_str(&format!(
                "{},{},{},{},{},{},{}\n",
                core.core_id,
                core.instructions,
                core.cycles,
                core.time_ns,
                net.packets_sent,
                net.packets_received,
                net.average_packet_latency().as_ns(),
            ));
        }
        csv
    }

    pub fn write_cores_csv<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        std::fs::write(path, self.cores_csv())
    }

    pub fn write_report<W: Write>(&self, mut w: W) -> io::Result<()> {
        match &self.run.network {
            Some(network) => writeln!(
                w,
                "Run '{}': {} cores over {}, process {}",
                self.run.label, self.run.total_cores, network, self.run.process
            )?,
            None => writeln!(w, "Run '{}'", self.run.label)?,
        }

        for core in self.cores.values() {
            writeln!(
                w,
                "Core {}: {} instructions, {} cycles, {} ns, {} sent / {} received",
                core.core_id,
                core.instructions,
                core.cycles,
                core.time_ns,
                core.network.packets_sent,
                core.network.packets_received,
            )?;
        }
        if let Some(bus) = &self.bus {
            writeln!(
                w,
                "Bus: {} packets, {} delayed, {} ns queued",
                bus.packets,
                bus.delayed_packets,
                bus.total_delay.as_ns()
            )?;
        }
        if let Some(links) = &self.mesh_links {
            writeln!(
                w,
                "Mesh links: {} traversals, {} delayed, {} ns queued",
                links.packets,
                links.delayed_packets,
                links.total_delay.as_ns()
            )?;
        }
        writeln!(
            w,
            "Host: {:.2} ms wall, {} ns simulated, {:.0} instructions/s",
            self.host.wall_time_ms, self.host.simulated_time_ns, self.host.instructions_per_second
        )
    }

    pub fn report(&self) -> String {
        let mut buf = Vec::new();
        match self.write_report(&mut buf) {
            Ok(()) => String::from_utf8_lossy(&buf).into_owned(),
            Err(_) => String::new(),
        }
    }
}

fn queue_rows(names: [&'static str; 3], queue: &QueueStats) -> [(&'static str, String); 3] {
    [
        (names[0], queue.packets.to_string()),
        (names[1], queue.delayed_packets.to_string()),
        (names[2], queue.total_delay.as_ns().to_string()),
    ]
}

fn unix_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// Host wall clock for one run.
#[derive(Clone, Copy, Debug)]
pub struct WallClock(Instant);

impl WallClock {
    pub fn start() -> Self {
        Self(Instant::now())
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.0.elapsed().as_secs_f64() * 1000.0
    }
}

/// Collects [`SimulationStats`] over the lifetime of a run.
#[derive(Debug, Default)]
pub struct StatsRecorder {
    stats: SimulationStats,
    clock: Option<WallClock>,
}

impl StatsRecorder {
    pub fn new(stats: SimulationStats) -> Self {
        Self { stats, clock: None }
    }

    pub fn start(&mut self) {
        self.clock = Some(WallClock::start());
        self.stats.run.started_unix_secs = Some(unix_secs());
    }

    pub fn record_core(&mut self, core: &Core) {
        self.stats.record_core(core);
    }

    pub fn record_fabric(&mut self, fabric: &NetworkFabric) {
        self.stats.record_fabric(fabric);
    }

    pub fn stop(&mut self) {
        self.stats.run.finished_unix_secs = Some(unix_secs());
        let wall_ms = self.clock.map_or(0.0, |c| c.elapsed_ms());
        self.stats.finalize(wall_ms);
    }

    pub fn stats(&self) -> &SimulationStats {
        &self.stats
    }

    pub fn into_stats(self) -> SimulationStats {
        self.stats
    }
}
