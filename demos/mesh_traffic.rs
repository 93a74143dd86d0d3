//! Mesh Traffic Example
//!
//! Runs one simulation thread per core of a 4x4 electrical mesh. Every core
//! sends a packet to every other core, and each receiving thread charges
//! its core for the time spent waiting on arrivals.
//!
//! The example showcases:
//! - Configuration from YAML
//! - Per-core network model instances sharing mesh link queues
//! - SimThreadManager startup and shutdown
//! - Summary output

use std::sync::Arc;

use parking_lot::Mutex;

use coresim::{
    CoreId, HandlerFactory, Instruction, LocalTransport, NetPacket, NetworkFabric, PacketHandler, PacketType,
    PerformanceModel, SimConfig, SimThreadManager, SubsecondTime, Transport,
};

const CONFIG: &str = r#"
general:
  total_cores: 16
  core_frequency: 1.0
network:
  user: emesh_hop_by_hop_basic
  emesh_hop_by_hop_basic:
    link_bandwidth: 64
    hop_latency: 2
    queue_model:
      enabled: true
      type: contention
"#;

const PACKET_BYTES: u32 = 32;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    coresim::init_logging("info");

    let config = SimConfig::from_yaml(CONFIG)?;
    let fabric = NetworkFabric::from_config(&config)?;
    let domain = config.core_domain()?;
    let total = config.total_cores();
    let transport = Arc::new(LocalTransport::new(total, 1));

    println!("Mesh Traffic Example");
    println!("  Cores:        {}", total);
    println!("  Packet bytes: {}", PACKET_BYTES);
    println!();

    // Receiver side: one performance model per core, owned by its thread.
    let finish_times: Arc<Mutex<Vec<SubsecondTime>>> = Arc::new(Mutex::new(vec![SubsecondTime::ZERO; total as usize]));
    let factory: HandlerFactory = {
        let finish_times = Arc::clone(&finish_times);
        Arc::new(move |core: CoreId| -> PacketHandler {
            let finish_times = Arc::clone(&finish_times);
            let mut perf = PerformanceModel::new(core, domain);
            Box::new(move |pkt: NetPacket| {
                let stall = pkt.time.saturating_sub(perf.elapsed_time());
                if perf.handle_instruction(&Instruction::recv(stall)).is_ok() {
                    finish_times.lock()[core as usize] = perf.elapsed_time();
                }
            })
        })
    };

    let mut manager = SimThreadManager::from_config(&config, transport.clone(), factory);
    manager.spawn_sim_threads()?;

    // Sender side: all-to-all traffic injected at time zero.
    for sender in 0..total {
        let mut model = fabric.create_model(config.network.user, sender)?;
        for receiver in (0..total).filter(|&r| r != sender) {
            let pkt = NetPacket::sized(SubsecondTime::ZERO, PacketType::User, sender, receiver, PACKET_BYTES);
            for hop in model.route_packet(&pkt).iter().filter(|h| h.is_delivery()) {
                transport.send(hop.final_dest, pkt.delivered_to(hop.final_dest, hop.time))?;
            }
        }
    }

    manager.quit_sim_threads()?;

    println!("Last arrival per core (ns):");
    let finish_times = finish_times.lock();
    for (core, time) in finish_times.iter().enumerate() {
        println!("  core {:>2}: {}", core, time.as_ns());
    }
    println!();

    let mut out = std::io::stdout();
    fabric.output_summary(&mut out)?;
    Ok(())
}
