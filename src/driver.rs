//! Process-level assembly of cores, network and statistics.
//!
//! [`Simulator`] builds the local cores of the current process from a
//! [`SimConfig`]: one performance model and one network model instance per
//! core, all sharing one [`NetworkFabric`] and one transport. It can replay
//! per-core instruction traces, in parallel when the `parallel` feature is
//! enabled, and gathers the final statistics.
//!
//! # Feature Flag
//!
//! ```toml
//! [dependencies]
//! coresim = { version = "0.1", features = ["parallel"] }
//! ```

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::branch_predictor::OneBitBranchPredictor;
use crate::config::{ConfigError, SimConfig};
use crate::instruction::{DynamicInstructionInfo, Instruction};
use crate::network::NetworkFabric;
use crate::performance_model::{PerformanceModel, Retirement};
use crate::progress_trace::ProgressTrace;
use crate::sim_core::{Core, CoreError};
use crate::stats::{SimulationStats, StatsRecorder};
use crate::transport::{LocalTransport, Transport};
use crate::types::CoreId;

#[derive(Error, Debug)]
pub enum SimulatorError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("core {core}: {source}")]
    Core {
        core: CoreId,
        #[source]
        source: CoreError,
    },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// One element of a per-core instruction trace.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TraceEntry {
    /// Run-time information for an upcoming memory operand.
    Info(DynamicInstructionInfo),
    Instruction(Instruction),
}

/// Outcome of replaying one core's trace.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TraceReport {
    pub retired: u64,
    /// Instructions that could not retire because their information or
    /// cost never became available.
    pub pending: u64,
}

pub struct Simulator {
    config: SimConfig,
    transport: Arc<dyn Transport>,
    fabric: NetworkFabric,
    cores: Vec<Core>,
    recorder: StatsRecorder,
}

impl Simulator {
    /// Builds a single-process simulator with an in-process transport.
    pub fn new(config: SimConfig) -> Result<Self, SimulatorError> {
        let transport = Arc::new(LocalTransport::new(
            config.total_cores(),
            config.general.num_processes,
        ));
        Self::with_transport(config, transport)
    }

    /// Builds the local cores of `config`'s current process on top of an
    /// existing transport.
    pub fn with_transport(config: SimConfig, transport: Arc<dyn Transport>) -> Result<Self, SimulatorError> {
        config.validate()?;
        let fabric = NetworkFabric::from_config(&config)?;
        let domain = config.core_domain()?;
        let progress = ProgressTrace::new(&config.progress_trace, &config.general.output_dir);
        if progress.is_some() {
            std::fs::create_dir_all(&config.general.output_dir)?;
        }

        let mut cores = Vec::new();
        for core_id in config.core_list_for_current_process() {
            let mut perf = PerformanceModel::new(core_id, domain)
                .with_branch_predictor(Box::new(OneBitBranchPredictor::default()));
            if !config.general.enable_performance_modeling {
                perf.disable();
            }
            let network = fabric.create_model(config.network.user, core_id)?;

            let mut core = Core::new(perf, network, Arc::clone(&transport));
            if let Some(progress) = &progress {
                core = core.with_progress_trace(progress.for_core(core_id));
            }
            cores.push(core);
        }

        info!(
            process = config.general.current_process,
            local_cores = cores.len(),
            network = %config.network.user,
            "Simulator created"
        );

        let mut recorder = StatsRecorder::new(SimulationStats::for_config(&config));
        recorder.start();

        Ok(Self {
            config,
            transport,
            fabric,
            cores,
            recorder,
        })
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn fabric(&self) -> &NetworkFabric {
        &self.fabric
    }

    pub fn cores(&self) -> &[Core] {
        &self.cores
    }

    pub fn core(&self, id: CoreId) -> Option<&Core> {
        self.cores.iter().find(|c| c.id() == id)
    }

    pub fn core_mut(&mut self, id: CoreId) -> Option<&mut Core> {
        self.cores.iter_mut().find(|c| c.id() == id)
    }

    /// Hands the local cores out, e.g. to move them onto their own threads.
    pub fn take_cores(&mut self) -> Vec<Core> {
        std::mem::take(&mut self.cores)
    }

    /// Returns cores previously taken with [`Simulator::take_cores`].
    pub fn restore_cores(&mut self, cores: Vec<Core>) {
        self.cores = cores;
    }

    /// Replays per-core traces sequentially.
    #[cfg(not(feature = "parallel"))]
    pub fn run_traces(
        &mut self,
        traces: &BTreeMap<CoreId, Vec<TraceEntry>>,
    ) -> Result<BTreeMap<CoreId, TraceReport>, SimulatorError> {
        let mut reports = BTreeMap::new();
        for core in self.cores.iter_mut() {
            let report = replay(core, traces.get(&core.id()).map(Vec::as_slice))?;
            reports.insert(core.id(), report);
        }
        Ok(reports)
    }

    /// Replays per-core traces, one rayon task per core.
    #[cfg(feature = "parallel")]
    pub fn run_traces(
        &mut self,
        traces: &BTreeMap<CoreId, Vec<TraceEntry>>,
    ) -> Result<BTreeMap<CoreId, TraceReport>, SimulatorError> {
        self.cores
            .par_iter_mut()
            .map(|core| -> Result<(CoreId, TraceReport), SimulatorError> {
                let report = replay(core, traces.get(&core.id()).map(Vec::as_slice))?;
                Ok((core.id(), report))
            })
            .collect()
    }

    /// Writes every local core's summary followed by the shared network
    /// statistics.
    pub fn output_summary(&self, out: &mut dyn Write) -> io::Result<()> {
        for core in &self.cores {
            core.output_summary(out)?;
        }
        self.fabric.output_summary(out)
    }

    /// Closes per-core outputs and returns the run's statistics.
    pub fn finish(&mut self) -> Result<SimulationStats, SimulatorError> {
        for core in self.cores.iter_mut() {
            let id = core.id();
            core.finish()
                .map_err(|source| SimulatorError::Core { core: id, source })?;
            self.recorder.record_core(core);
        }
        self.recorder.record_fabric(&self.fabric);
        self.recorder.stop();

        let stats = self.recorder.stats().clone();
        info!(
            instructions = stats.total_instructions(),
            simulated_ns = stats.host.simulated_time_ns,
            "Simulation finished"
        );
        Ok(stats)
    }
}

fn replay(core: &mut Core, trace: Option<&[TraceEntry]>) -> Result<TraceReport, SimulatorError> {
    let mut report = TraceReport::default();
    let id = core.id();

    for entry in trace.unwrap_or(&[]) {
        match entry {
            TraceEntry::Info(info) => core.performance_model_mut().push_dynamic_instruction_info(*info),
            TraceEntry::Instruction(instruction) => {
                match core
                    .execute(instruction)
                    .map_err(|source| SimulatorError::Core { core: id, source })?
                {
                    Retirement::Retired(_) => report.retired += 1,
                    Retirement::Pending(_) => report.pending += 1,
                }
            }
        }
    }
    Ok(report)
}
