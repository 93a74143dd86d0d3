//! # coresim
//!
//! Timing and network core of a parallel multicore architecture simulator.
//!
//! ## Overview
//!
//! - **Time**: [`SubsecondTime`] is an integer femtosecond count; every
//!   simulated component keeps its own [`ComponentTime`] in its clock
//!   domain.
//! - **Contention**: shared resources are modeled by [`QueueModel`]s that
//!   serialize reservations and report completion times.
//! - **Networks**: per-core [`NetworkModel`] instances route packets over a
//!   shared bus or a 2-D electrical mesh and stamp every hop with its
//!   arrival time.
//! - **Performance model**: each core accumulates instruction costs and
//!   memory latencies into its clock; receive stalls are charged when
//!   packets arrive.
//! - **Threads**: [`SimThreadManager`] runs one simulation thread per local
//!   core and tears them down with control packets.
//!
//! ## Features
//!
//! - `parallel` - Replay per-core instruction traces in parallel using rayon
//!
//! ## Quick Start
//!
//! ```rust
//! use coresim::config::{EMeshParams, QueueModelParams, SimConfigBuilder};
//! use coresim::packet::PacketType;
//! use coresim::Simulator;
//!
//! let config = SimConfigBuilder::new(16)
//!     .emesh(EMeshParams::new(64, 2).with_queue_model(QueueModelParams::disabled()))
//!     .build()
//!     .unwrap();
//! let mut sim = Simulator::new(config).unwrap();
//!
//! // Core 0 at (0,0) sends to core 15 at (3,3): 6 hops of 2 cycles.
//! sim.core_mut(0).unwrap().send(PacketType::User, 15, vec![0; 8]).unwrap();
//! let pkt = sim.core_mut(15).unwrap().receive().unwrap();
//! assert_eq!(pkt.time.as_ns(), 12);
//! ```
//!
//! ## Configuration-Driven Setup
//!
//! ```rust,ignore
//! use coresim::config::SimConfig;
//!
//! let config = SimConfig::from_file("simulation.yaml")?;
//! let sim = coresim::Simulator::new(config)?;
//! ```

pub mod types;
pub mod time;
pub mod packet;
pub mod queue_model;
pub mod network;
pub mod instruction;
pub mod branch_predictor;
pub mod performance_model;
pub mod progress_trace;
pub mod transport;
pub mod sim_core;
pub mod sim_thread;
pub mod config;
pub mod stats;
pub mod driver;

// Re-export commonly used types
pub use types::{CoreId, CoreList, ProcessId, BROADCAST};
pub use time::{ComponentBandwidthPerCycle, ComponentLatency, ComponentPeriod, ComponentTime, SubsecondTime};
pub use packet::{Hop, NetPacket, PacketType, PayloadTooLarge};
pub use queue_model::{QueueModel, QueueModelType, QueueStats, SharedQueueModel};
pub use network::{AccountingPolicy, NetworkFabric, NetworkModel, NetworkModelType, NetworkStats};
pub use instruction::{DynamicInstructionInfo, Instruction, InstructionCost, InstructionType, Operand};
pub use performance_model::{PerfModelError, PerformanceModel, Retirement};
pub use transport::{LocalTransport, Transport, TransportError};
pub use sim_core::{Core, CoreError};
pub use sim_thread::{HandlerFactory, PacketHandler, SimThreadManager, ThreadError};
pub use config::{ConfigError, ConfigStore, SimConfig, SimConfigBuilder};
pub use stats::{SimulationStats, StatsRecorder, WallClock};
pub use driver::{Simulator, SimulatorError, TraceEntry};

/// Initialize the tracing subscriber for logging.
///
/// Call this at the start of your program to enable logging. `RUST_LOG`
/// overrides `level` when set.
///
/// # Example
///
/// ```rust,ignore
/// coresim::init_logging("info");
/// ```
pub fn init_logging(level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(true)
        .with_file(false)
        .with_line_number(false)
        .init();
}
