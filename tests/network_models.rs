//! Integration tests for the bus and mesh network models.
//!
//! These tests verify timing properties across model instances:
//! - Contention on a shared bus
//! - Hop-by-hop latency on the mesh
//! - Mutual exclusion of concurrent reservations

use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

use coresim::config::{BusParams, ConfigStore, EMeshParams, QueueModelParams, SimConfig, SimConfigBuilder};
use coresim::network::{BusGlobal, MeshFabric, MeshGeometry, NetworkModelBus, NetworkModelEMeshHopByHop};
use coresim::{
    ComponentPeriod, ConfigError, NetPacket, NetworkFabric, NetworkModel, NetworkModelType, PacketType,
    QueueModelType, SubsecondTime, BROADCAST,
};

fn ghz1() -> ComponentPeriod {
    ComponentPeriod::from_ghz(1.0).unwrap()
}

fn packet(sender: u32, receiver: u32, length: u32) -> NetPacket {
    NetPacket::sized(SubsecondTime::ZERO, PacketType::User, sender, receiver, length)
}

// ============================================================================
// Bus
// ============================================================================

#[test]
fn test_two_core_bus_contention() {
    // 1 bit/cycle, 8-bit packets sent by both cores at time zero.
    let bus = Arc::new(BusGlobal::new(&BusParams::new(1), ghz1()).unwrap());
    let mut core0 = NetworkModelBus::new(0, 2, bus.clone());
    let mut core1 = NetworkModelBus::new(1, 2, bus.clone());

    let first = core0.route_packet(&packet(0, 1, 1));
    let second = core1.route_packet(&packet(1, 0, 1));

    assert_eq!(first[0].time.to_cycles(ghz1()), 8);
    assert_eq!(second[0].time.to_cycles(ghz1()), 16);

    let stats = bus.stats();
    assert_eq!(stats.packets, 2);
    assert_eq!(stats.delayed_packets, 1);
}

#[test]
fn test_bus_idle_resource_is_exact() {
    let bus = Arc::new(BusGlobal::new(&BusParams::new(16), ghz1()).unwrap());
    let mut model = NetworkModelBus::new(0, 4, bus);

    let mut pkt = packet(0, 3, 6);
    pkt.time = SubsecondTime::from_ns(1_000);
    let hops = model.route_packet(&pkt);
    // 48 bits over 16 bits/cycle.
    assert_eq!(hops[0].time, SubsecondTime::from_ns(1_003));
}

#[test]
fn test_bus_concurrent_reservations_never_overlap() {
    const THREADS: u32 = 8;
    const PACKETS: u64 = 200;

    let bus = Arc::new(BusGlobal::new(&BusParams::new(8), ghz1()).unwrap());

    let handles: Vec<_> = (0..THREADS)
        .map(|core| {
            let bus = Arc::clone(&bus);
            thread::spawn(move || {
                let mut model = NetworkModelBus::new(core, THREADS, bus);
                (0..PACKETS)
                    .map(|_| model.route_packet(&packet(core, (core + 1) % THREADS, 1))[0].time)
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut completions: Vec<SubsecondTime> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();
    completions.sort();

    // Every 1-cycle transaction got its own slot.
    let expected: Vec<SubsecondTime> = (1..=u64::from(THREADS) * PACKETS)
        .map(SubsecondTime::from_ns)
        .collect();
    assert_eq!(completions, expected);
    assert_eq!(bus.stats().packets, u64::from(THREADS) * PACKETS);
}

#[test]
fn test_bus_completion_never_precedes_request() {
    let bus = Arc::new(BusGlobal::new(&BusParams::new(4), ghz1()).unwrap());
    let mut model = NetworkModelBus::new(0, 2, bus);

    let mut last = SubsecondTime::ZERO;
    for start in [30u64, 5, 90, 90, 12, 400] {
        let mut pkt = packet(0, 1, 3);
        pkt.time = SubsecondTime::from_ns(start);
        let done = model.route_packet(&pkt)[0].time;
        assert!(done >= pkt.time + SubsecondTime::from_ns(6));
        assert!(done >= last);
        last = done;
    }
}

#[test]
fn test_bus_broadcast_single_transaction() {
    let bus = Arc::new(BusGlobal::new(&BusParams::new(8), ghz1()).unwrap());
    let mut model = NetworkModelBus::new(2, 4, bus.clone());

    let hops = model.route_packet(&packet(2, BROADCAST, 2));
    let receivers: HashSet<u32> = hops.iter().map(|h| h.final_dest).collect();
    assert_eq!(receivers, (0..4).collect());
    assert_eq!(bus.stats().bytes, 2);
}

// ============================================================================
// E-Mesh
// ============================================================================

#[test]
fn test_mesh_4x4_corner_to_corner() {
    let params = EMeshParams::new(64, 2).with_queue_model(QueueModelParams::disabled());
    let fabric = Arc::new(MeshFabric::new(16, &params, ghz1()).unwrap());
    let mut model = NetworkModelEMeshHopByHop::new(0, fabric, ghz1());

    let hops = model.route_packet(&packet(0, 15, 8));
    assert_eq!(hops.len(), 6);
    assert_eq!(hops.last().unwrap().next_dest, 15);
    assert_eq!(hops.last().unwrap().time.to_cycles(ghz1()), 12);
}

#[test]
fn test_mesh_hop_latency_is_additive() {
    let params = EMeshParams::new(64, 3).with_queue_model(QueueModelParams::disabled());
    let fabric = Arc::new(MeshFabric::new(12, &params, ghz1()).unwrap());
    let geometry = *fabric.geometry();

    for src in 0..12 {
        let mut model = NetworkModelEMeshHopByHop::new(src, fabric.clone(), ghz1());
        for dst in 0..12 {
            let hops = model.route_packet(&packet(src, dst, 8));
            let delivery = hops.iter().find(|h| h.is_delivery()).unwrap();
            let expected = u64::from(geometry.distance(src, dst)) * 3;
            assert_eq!(delivery.time.to_cycles(ghz1()), expected, "{} -> {}", src, dst);
        }
    }
}

#[test]
fn test_mesh_routes_are_deterministic_and_loop_free() {
    for cores in [1u32, 2, 5, 10, 16, 17, 64] {
        let geometry = MeshGeometry::new(cores);
        for src in 0..cores {
            for dst in 0..cores {
                let route = geometry.route(src, dst);
                assert_eq!(route, geometry.route(src, dst));
                assert_eq!(route.len() as u32, geometry.distance(src, dst));

                let visited: HashSet<u32> = route.iter().map(|(router, _)| *router).collect();
                assert_eq!(visited.len(), route.len(), "loop on {} -> {}", src, dst);
            }
        }
    }
}

#[test]
fn test_mesh_shared_link_contention() {
    let params = EMeshParams::new(8, 1);
    let fabric = Arc::new(MeshFabric::new(16, &params, ghz1()).unwrap());

    // Cores 0 and 1 both send eastwards through the 1 -> 2 link.
    let mut a = NetworkModelEMeshHopByHop::new(0, fabric.clone(), ghz1());
    let mut b = NetworkModelEMeshHopByHop::new(1, fabric.clone(), ghz1());

    let via = a.route_packet(&packet(0, 3, 1));
    let direct = b.route_packet(&packet(1, 3, 1));

    // a: 0->1 done at 2, 1->2 at 4, 2->3 at 6.
    assert_eq!(via.last().unwrap().time, SubsecondTime::from_ns(6));
    // b reaches link 1->2 at 0 but it is busy until 3: leaves at 4, hop
    // to 5; link 2->3 is then busy until 5: leaves at 6, hop to 7.
    assert_eq!(direct.last().unwrap().time, SubsecondTime::from_ns(7));
    assert!(fabric.link_stats().delayed_packets >= 1);
}

// ============================================================================
// Configuration-driven construction
// ============================================================================

#[test]
fn test_fabric_from_yaml() {
    let yaml = r#"
general:
  total_cores: 16
network:
  user: emesh_hop_by_hop_basic
  emesh_hop_by_hop_basic:
    link_bandwidth: 64
    hop_latency: 2
    queue_model:
      enabled: false
      type: contention
"#;
    let config = SimConfig::from_yaml(yaml).unwrap();
    let fabric = NetworkFabric::from_config(&config).unwrap();
    let mut model = fabric.create_model(config.network.user, 0).unwrap();

    assert_eq!(model.model_type(), NetworkModelType::EMeshHopByHopBasic);
    let hops = model.route_packet(&packet(0, 15, 8));
    assert_eq!(hops.last().unwrap().time, SubsecondTime::from_ns(12));
}

#[test]
fn test_missing_link_bandwidth_fails_construction() {
    let store = ConfigStore::from_yaml(
        "network:\n  emesh_hop_by_hop_basic:\n    hop_latency: 2\n    queue_model:\n      enabled: true\n      type: contention\n",
    )
    .unwrap();
    match EMeshParams::from_store(&store) {
        Err(ConfigError::MissingParameter(key)) => {
            assert_eq!(key, "network/emesh_hop_by_hop_basic/link_bandwidth")
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_analytical_bus_selected_by_config() {
    let store = ConfigStore::from_yaml(
        "network:\n  bus:\n    bandwidth: 8\n    queue_model:\n      type: analytical\n",
    )
    .unwrap();
    let params = BusParams::from_store(&store).unwrap();
    assert_eq!(params.queue_model.model_type, QueueModelType::Analytical);

    let bus = Arc::new(BusGlobal::new(&params, ghz1()).unwrap());
    let mut model = NetworkModelBus::new(0, 2, bus);
    assert_eq!(model.route_packet(&packet(0, 1, 4))[0].time, SubsecondTime::from_ns(4));
}

#[test]
fn test_mcp_detour_applies_to_mesh() {
    let config = SimConfigBuilder::new(4)
        .emesh(EMeshParams::new(1, 1))
        .mcp_detour(true)
        .build()
        .unwrap();
    let fabric = NetworkFabric::from_config(&config).unwrap();
    let mut model = fabric.create_model(NetworkModelType::EMeshHopByHopBasic, 0).unwrap();

    // Core 3 is the control-plane core: only hop latency is charged.
    let hops = model.route_packet(&packet(0, 3, 64));
    assert_eq!(hops.last().unwrap().time, SubsecondTime::from_ns(2));
}
