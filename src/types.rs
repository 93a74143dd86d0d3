//! Core type definitions for the simulation core.
//!
//! This module defines the identifiers shared by every model in the crate.

/// Identifier of a simulated core.
///
/// Cores are numbered densely from zero. The last core of the simulation
/// is the control-plane (MCP) core.
pub type CoreId = u32;

/// Identifier of a host process taking part in the simulation.
///
/// Cores are distributed over processes; each process hosts its own set of
/// simulation threads.
pub type ProcessId = u32;

/// Reserved receiver id meaning "every core".
pub const BROADCAST: CoreId = CoreId::MAX;

/// Ordered list of core ids, e.g. the cores hosted by one process.
pub type CoreList = Vec<CoreId>;
