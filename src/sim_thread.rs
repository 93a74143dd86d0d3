//! Lifecycle of the per-core simulation threads of one process.
//!
//! Every local core gets a simulation thread that pulls packets from the
//! core's transport endpoint and hands them to a per-core packet handler.
//! With `perf_model_own_thread`, each core additionally gets a core thread
//! running the handler, fed by the simulation thread over a channel.
//!
//! Shutdown is cooperative and travels over the same transport as ordinary
//! traffic: a core-thread terminate packet (if split) followed by a
//! sim-thread terminate packet per local core. The manager then waits for
//! the active-thread count to drop to zero, joins the threads, and enters
//! the global barrier.

use crossbeam_channel::Sender;
use parking_lot::{Condvar, Mutex};
use std::io;
use std::sync::Arc;
use std::thread::JoinHandle;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::config::SimConfig;
use crate::packet::{NetPacket, PacketType};
use crate::transport::{Transport, TransportError};
use crate::types::{CoreId, CoreList};

#[derive(Error, Debug)]
pub enum ThreadError {
    #[error("failed to spawn thread for core {core}: {source}")]
    Spawn {
        core: CoreId,
        #[source]
        source: io::Error,
    },

    #[error("failed to send quit message: {0}")]
    Transport(#[from] TransportError),
}

/// Consumes the packets delivered to one core.
pub type PacketHandler = Box<dyn FnMut(NetPacket) + Send>;

/// Creates the packet handler of a core.
pub type HandlerFactory = Arc<dyn Fn(CoreId) -> PacketHandler + Send + Sync>;

/// Count of running simulation and core threads.
#[derive(Debug, Default)]
struct ActiveThreads {
    count: Mutex<usize>,
    idle: Condvar,
}

impl ActiveThreads {
    fn start_callback(&self) {
        *self.count.lock() += 1;
    }

    fn exit_callback(&self) {
        let mut count = self.count.lock();
        *count -= 1;
        if *count == 0 {
            self.idle.notify_all();
        }
    }

    fn wait_idle(&self) {
        let mut count = self.count.lock();
        while *count > 0 {
            self.idle.wait(&mut count);
        }
    }

    fn count(&self) -> usize {
        *self.count.lock()
    }
}

/// Registers a running thread for as long as it is alive, including when
/// its handler panics.
struct ActiveGuard(Arc<ActiveThreads>);

impl ActiveGuard {
    fn new(active: &Arc<ActiveThreads>) -> Self {
        active.start_callback();
        Self(Arc::clone(active))
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.exit_callback();
    }
}

pub struct SimThreadManager {
    transport: Arc<dyn Transport>,
    local_cores: CoreList,
    perf_model_own_thread: bool,
    handler_factory: HandlerFactory,
    active: Arc<ActiveThreads>,
    handles: Vec<(CoreId, JoinHandle<()>)>,
}

impl SimThreadManager {
    pub fn new(transport: Arc<dyn Transport>, local_cores: CoreList, handler_factory: HandlerFactory) -> Self {
        Self {
            transport,
            local_cores,
            perf_model_own_thread: false,
            handler_factory,
            active: Arc::new(ActiveThreads::default()),
            handles: Vec::new(),
        }
    }

    /// Manager for the cores of the configured current process.
    pub fn from_config(config: &SimConfig, transport: Arc<dyn Transport>, handler_factory: HandlerFactory) -> Self {
        Self::new(transport, config.core_list_for_current_process(), handler_factory)
            .with_perf_model_own_thread(config.general.perf_model_own_thread)
    }

    pub fn with_perf_model_own_thread(mut self, enable: bool) -> Self {
        self.perf_model_own_thread = enable;
        self
    }

    pub fn local_cores(&self) -> &CoreList {
        &self.local_cores
    }

    /// Number of threads currently running.
    pub fn active_threads(&self) -> usize {
        self.active.count()
    }

    fn threads_per_core(&self) -> usize {
        if self.perf_model_own_thread {
            2
        } else {
            1
        }
    }

    /// Spawns the threads of every local core. Does not wait for them to
    /// start running.
    pub fn spawn_sim_threads(&mut self) -> Result<(), ThreadError> {
        info!(
            threads = self.local_cores.len() * self.threads_per_core(),
            "Starting sim threads"
        );

        for &core in &self.local_cores {
            debug!(core, "Starting thread");
            let core_tx = if self.perf_model_own_thread {
                let (tx, rx) = crossbeam_channel::unbounded::<NetPacket>();
                let mut handler = (self.handler_factory)(core);
                let active = Arc::clone(&self.active);

                let handle = std::thread::Builder::new()
                    .name(format!("core-{}", core))
                    .spawn(move || {
                        let _guard = ActiveGuard::new(&active);
                        for pkt in rx.iter() {
                            if pkt.packet_type == PacketType::CoreThreadTerminateThreads {
                                break;
                            }
                            handler(pkt);
                        }
                    })
                    .map_err(|source| ThreadError::Spawn { core, source })?;
                self.handles.push((core, handle));
                Some(tx)
            } else {
                None
            };

            let handler = match core_tx {
                Some(_) => None,
                None => Some((self.handler_factory)(core)),
            };
            let transport = Arc::clone(&self.transport);
            let active = Arc::clone(&self.active);

            let handle = std::thread::Builder::new()
                .name(format!("sim-{}", core))
                .spawn(move || sim_thread_loop(core, transport, active, core_tx, handler))
                .map_err(|source| ThreadError::Spawn { core, source })?;
            self.handles.push((core, handle));
        }

        info!(active = self.active_threads(), "Threads started");
        Ok(())
    }

    /// Stops every local thread and enters the global barrier.
    ///
    /// If a quit message cannot be sent, the cores that were reached are
    /// still joined before the first error is returned. Threads of the
    /// unreached cores stay registered and the barrier is not entered.
    pub fn quit_sim_threads(&mut self) -> Result<(), ThreadError> {
        info!("Sending quit messages");

        let mut reached = CoreList::with_capacity(self.local_cores.len());
        let mut first_error = None;
        for &core in &self.local_cores {
            match self.send_quit(core) {
                Ok(()) => reached.push(core),
                Err(e) => {
                    error!(core, error = %e, "Failed to send quit message");
                    first_error.get_or_insert(e);
                }
            }
        }

        if let Some(e) = first_error {
            self.join_cores(&reached);
            return Err(e.into());
        }

        info!("Waiting for local sim threads to exit");
        self.active.wait_idle();
        self.join_cores(&reached);

        self.transport.barrier();
        info!("All threads have exited");
        Ok(())
    }

    fn send_quit(&self, core: CoreId) -> Result<(), TransportError> {
        // The core thread goes first: its terminate packet is relayed by
        // the sim thread, which must still be running.
        if self.perf_model_own_thread {
            self.transport
                .send(core, NetPacket::control(PacketType::CoreThreadTerminateThreads, core))?;
        }
        self.transport
            .send(core, NetPacket::control(PacketType::SimThreadTerminateThreads, core))
    }

    fn join_cores(&mut self, cores: &[CoreId]) {
        let (finished, running): (Vec<_>, Vec<_>) =
            self.handles.drain(..).partition(|(core, _)| cores.contains(core));
        self.handles = running;

        for (core, handle) in finished {
            let name = handle.thread().name().unwrap_or("sim").to_string();
            if handle.join().is_err() {
                warn!(core, thread = %name, "Simulation thread panicked");
            }
        }
    }
}

fn sim_thread_loop(
    core: CoreId,
    transport: Arc<dyn Transport>,
    active: Arc<ActiveThreads>,
    core_tx: Option<Sender<NetPacket>>,
    mut handler: Option<PacketHandler>,
) {
    let _guard = ActiveGuard::new(&active);

    loop {
        let pkt = match transport.recv(core) {
            Ok(pkt) => pkt,
            Err(e) => {
                error!(core, error = %e, "Sim thread lost its transport endpoint");
                break;
            }
        };

        if pkt.packet_type == PacketType::SimThreadTerminateThreads {
            break;
        }

        match (&core_tx, handler.as_mut()) {
            (Some(tx), _) => {
                if tx.send(pkt).is_err() {
                    warn!(core, "Core thread has already exited");
                }
            }
            (None, Some(handler)) => {
                if pkt.packet_type != PacketType::CoreThreadTerminateThreads {
                    handler(pkt);
                }
            }
            (None, None) => {}
        }
    }
    debug!(core, "Sim thread exiting");
}

impl Drop for SimThreadManager {
    fn drop(&mut self) {
        let active = self.active.count();
        if active != 0 {
            warn!(active, "Threads still active when SimThreadManager exits");
        }
    }
}
