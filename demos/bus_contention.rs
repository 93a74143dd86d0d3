//! Bus Contention Example
//!
//! Compares the exact and analytical queue models on a shared bus. Each
//! core replays a short instruction trace, then sends a burst of packets to
//! its neighbour; the bus summary shows how much queueing each model
//! charged.

use std::collections::BTreeMap;

use coresim::config::{BusParams, QueueModelParams, SimConfigBuilder};
use coresim::driver::TraceEntry;
use coresim::{Instruction, InstructionCost, InstructionType, PacketType, QueueModelType, Simulator};

const CORES: u32 = 8;
const BURST: usize = 16;

fn run(model_type: QueueModelType) -> Result<(), Box<dyn std::error::Error>> {
    let mut bus = BusParams::new(32);
    bus.queue_model = QueueModelParams::enabled(model_type);

    let config = SimConfigBuilder::new(CORES).bus(bus).build()?;
    let mut sim = Simulator::new(config)?;

    // Stagger the cores so their bursts overlap only partly.
    let traces: BTreeMap<_, _> = (0..CORES)
        .map(|core| {
            let work = TraceEntry::Instruction(Instruction::new(
                InstructionType::Add,
                InstructionCost::Cycles(u64::from(core) * 20),
                vec![],
            ));
            (core, vec![work])
        })
        .collect();
    sim.run_traces(&traces)?;

    for core in 0..CORES {
        let sender = sim.core_mut(core).ok_or("missing core")?;
        for _ in 0..BURST {
            sender.send(PacketType::User, (core + 1) % CORES, vec![0; 64])?;
        }
    }
    for core in 0..CORES {
        let receiver = sim.core_mut(core).ok_or("missing core")?;
        for _ in 0..BURST {
            receiver.receive()?;
        }
    }

    let stats = sim.finish()?;
    println!("=== {} queue model ===", model_type);
    if let Some(bus) = &stats.bus {
        println!("  Packets:            {}", bus.packets);
        println!("  Delayed packets:    {}", bus.delayed_packets);
        println!("  Average delay (ns): {}", bus.average_delay().as_ns());
    }
    println!("  Simulated time (ns): {}", stats.host.simulated_time_ns);
    println!();
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    coresim::init_logging("warn");

    for model_type in [QueueModelType::Contention, QueueModelType::Analytical] {
        run(model_type)?;
    }
    Ok(())
}
