//! Integration tests for the coresim library.
//!
//! These tests drive a whole [`Simulator`] from configuration:
//! - YAML configuration to local cores and network
//! - Packet exchange between cores with receive stalls
//! - Statistics export after a run

use std::collections::BTreeMap;
use std::path::PathBuf;

use coresim::config::{BusParams, EMeshParams, ProgressTraceParams, QueueModelParams, SimConfigBuilder};
use coresim::driver::TraceEntry;
use coresim::{
    ConfigError, DynamicInstructionInfo, Instruction, InstructionCost, InstructionType, NetworkModelType, Operand,
    PacketType, SimConfig, Simulator, SimulatorError, SubsecondTime, BROADCAST,
};

fn temp_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("coresim_it_{}_{}", name, std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn add(cycles: u64) -> TraceEntry {
    TraceEntry::Instruction(Instruction::new(InstructionType::Add, InstructionCost::Cycles(cycles), vec![]))
}

// ============================================================================
// Configuration
// ============================================================================

#[test]
fn test_simulator_from_yaml() {
    let yaml = r#"
general:
  total_cores: 4
  core_frequency: 2.0
network:
  user: bus
  bus:
    bandwidth: 16
    queue_model:
      enabled: true
      type: contention
static_instruction_costs:
  mul: 7
"#;
    let config = SimConfig::from_yaml(yaml).unwrap();
    assert_eq!(config.network.user, NetworkModelType::Bus);
    assert_eq!(config.static_instruction_costs.get(InstructionType::Mul), Some(7));

    let sim = Simulator::new(config).unwrap();
    assert_eq!(sim.cores().len(), 4);
    assert_eq!(sim.core(0).unwrap().network_model().model_type(), NetworkModelType::Bus);
}

#[test]
fn test_invalid_configuration_is_rejected() {
    // The selected topology has no parameters.
    let yaml = "general:\n  total_cores: 4\nnetwork:\n  user: bus\n";
    assert!(matches!(SimConfig::from_yaml(yaml), Err(ConfigError::MissingParameter(_))));

    let mut config = SimConfigBuilder::new(4).build().unwrap();
    config.general.total_cores = 0;
    assert!(matches!(Simulator::new(config), Err(SimulatorError::Config(_))));
}

#[test]
fn test_config_file_roundtrip() {
    let dir = temp_dir("config");
    let path = dir.join("sim.yaml");

    let config = SimConfigBuilder::new(16)
        .emesh(EMeshParams::new(32, 2).with_broadcast_tree(true))
        .core_frequency(1.5)
        .build()
        .unwrap();
    config.to_yaml_file(&path).unwrap();

    let loaded = SimConfig::from_file(&path).unwrap();
    assert_eq!(loaded, config);

    std::fs::remove_dir_all(&dir).ok();
}

// ============================================================================
// Packet exchange
// ============================================================================

#[test]
fn test_mesh_send_and_receive() {
    let config = SimConfigBuilder::new(16)
        .emesh(EMeshParams::new(64, 2).with_queue_model(QueueModelParams::disabled()))
        .build()
        .unwrap();
    let mut sim = Simulator::new(config).unwrap();

    let delivered = sim.core_mut(0).unwrap().send(PacketType::User, 15, vec![1; 8]).unwrap();
    assert_eq!(delivered, 1);

    let receiver = sim.core_mut(15).unwrap();
    let pkt = receiver.receive().unwrap();
    assert_eq!(pkt.time, SubsecondTime::from_ns(12));
    assert_eq!(pkt.data, vec![1; 8]);
    // The receiver was idle, so it waits for the packet.
    assert_eq!(receiver.time(), SubsecondTime::from_ns(12));
}

#[test]
fn test_late_receiver_does_not_stall() {
    let config = SimConfigBuilder::new(2).bus(BusParams::new(8)).build().unwrap();
    let mut sim = Simulator::new(config).unwrap();

    let mut traces = BTreeMap::new();
    traces.insert(1, vec![add(100)]);
    sim.run_traces(&traces).unwrap();

    sim.core_mut(0).unwrap().send(PacketType::User, 1, vec![0; 4]).unwrap();
    let receiver = sim.core_mut(1).unwrap();
    let pkt = receiver.receive().unwrap();

    assert_eq!(pkt.time, SubsecondTime::from_ns(4));
    assert_eq!(receiver.time(), SubsecondTime::from_ns(100));
}

#[test]
fn test_bus_broadcast_reaches_every_core() {
    let config = SimConfigBuilder::new(4).bus(BusParams::new(32)).build().unwrap();
    let mut sim = Simulator::new(config).unwrap();

    let delivered = sim
        .core_mut(1)
        .unwrap()
        .send(PacketType::SharedMem, BROADCAST, vec![0; 8])
        .unwrap();
    assert_eq!(delivered, 4);

    for core in 0..4 {
        let pkt = sim.core_mut(core).unwrap().receive().unwrap();
        assert_eq!(pkt.receiver, core);
        assert_eq!(pkt.time, SubsecondTime::from_ns(2));
    }
}

#[test]
fn test_disabled_network_delivers_at_send_time() {
    let config = SimConfigBuilder::new(2).bus(BusParams::new(1)).build().unwrap();
    let mut sim = Simulator::new(config).unwrap();

    sim.core_mut(0).unwrap().network_model_mut().disable();
    sim.core_mut(0).unwrap().send(PacketType::User, 1, vec![0; 64]).unwrap();
    let pkt = sim.core_mut(1).unwrap().receive().unwrap();
    assert_eq!(pkt.time, SubsecondTime::ZERO);
}

// ============================================================================
// Traces and statistics
// ============================================================================

#[test]
fn test_trace_replay_and_stats_export() {
    let dir = temp_dir("stats");
    let config = SimConfigBuilder::new(4)
        .emesh(EMeshParams::new(64, 1))
        .output_dir(dir.to_string_lossy())
        .build()
        .unwrap();
    let mut sim = Simulator::new(config).unwrap();

    let mut traces = BTreeMap::new();
    for core in 0..4u32 {
        let mut trace = vec![add(u64::from(core) + 1)];
        trace.push(TraceEntry::Info(DynamicInstructionInfo::memory_read(SubsecondTime::from_ns(10), 0)));
        trace.push(TraceEntry::Instruction(Instruction::new(
            InstructionType::Generic,
            InstructionCost::Cycles(1),
            vec![Operand::memory_read()],
        )));
        traces.insert(core, trace);
    }
    let reports = sim.run_traces(&traces).unwrap();
    assert!(reports.values().all(|r| r.retired == 2 && r.pending == 0));

    sim.core_mut(0).unwrap().send(PacketType::User, 3, vec![0; 8]).unwrap();
    sim.core_mut(3).unwrap().receive().unwrap();

    let stats = sim.finish().unwrap();
    // 4 x 2 trace instructions plus core 3's receive.
    assert_eq!(stats.total_instructions(), 9);
    assert_eq!(stats.total_packets_sent(), 1);
    assert_eq!(stats.cores[&0].time_ns, 12);
    assert!(stats.mesh_links.is_some());
    assert!(stats.bus.is_none());

    let json_path = dir.join("stats.json");
    stats.write_json(&json_path).unwrap();
    let json: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
    assert_eq!(json["cores"]["3"]["network"]["packets_received"], 1);

    let csv = stats.cores_csv();
    assert_eq!(csv.lines().count(), 5);

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_progress_trace_written_per_core() {
    let dir = temp_dir("progress");
    let config = SimConfigBuilder::new(2)
        .output_dir(dir.to_string_lossy())
        .progress_trace(ProgressTraceParams::enabled(10))
        .build()
        .unwrap();
    let mut sim = Simulator::new(config).unwrap();

    let mut traces = BTreeMap::new();
    traces.insert(0, (0..30).map(|_| add(1)).collect::<Vec<_>>());
    sim.run_traces(&traces).unwrap();
    sim.finish().unwrap();

    let text = std::fs::read_to_string(dir.join("progress_trace_0")).unwrap();
    assert_eq!(text.lines().count(), 2);
    assert!(!dir.join("progress_trace_1").exists());

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_summary_output() {
    let config = SimConfigBuilder::new(2).bus(BusParams::new(8)).build().unwrap();
    let mut sim = Simulator::new(config).unwrap();
    sim.core_mut(0).unwrap().send(PacketType::User, 1, vec![0; 2]).unwrap();
    sim.core_mut(1).unwrap().receive().unwrap();

    let mut out = Vec::new();
    sim.output_summary(&mut out).unwrap();
    let text = String::from_utf8(out).unwrap();

    assert!(text.contains("Core 1 Summary:"));
    assert!(text.contains("Num Packets: 1"));
    assert!(text.contains("Packets Received: 1"));
}
