//! Queue models for shared network resources.
//!
//! A queue model answers one question: if a transfer of `bytes` bytes asks
//! for the resource no earlier than `start`, when does it complete? Every
//! reservation also updates the model's occupancy, so later callers observe
//! the effect of earlier ones.
//!
//! Two models share the [`QueueModel`] contract:
//!
//! - [`ContentionModel`]: a single free-time horizon, exact serialization.
//! - [`AnalyticalModel`]: an M/D/1 estimate driven by observed utilization.
//!
//! The model is picked by configuration (`queue_model/type`) through
//! [`create_queue_model`]. Resources shared between threads are held as a
//! [`SharedQueueModel`]; the lock is held around the whole
//! read-compute-write of a reservation.

pub mod analytical;
pub mod contention;

pub use analytical::AnalyticalModel;
pub use contention::ContentionModel;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::time::{ComponentBandwidthPerCycle, SubsecondTime};

/// Selects a queue model implementation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueModelType {
    Contention,
    Analytical,
}

impl QueueModelType {
    pub fn name(&self) -> &'static str {
        match self {
            QueueModelType::Contention => "contention",
            QueueModelType::Analytical => "analytical",
        }
    }
}

impl fmt::Display for QueueModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for QueueModelType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "contention" => Ok(QueueModelType::Contention),
            "analytical" => Ok(QueueModelType::Analytical),
            other => Err(format!("unknown queue model type '{}'", other)),
        }
    }
}

/// Counters kept by every queue model. Reporting only.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    /// Reservations made.
    pub packets: u64,
    /// Reservations that could not start at their requested time.
    pub delayed_packets: u64,
    pub bytes: u64,
    /// Total time the resource spent transferring.
    pub busy_time: SubsecondTime,
    /// Total queueing delay, not counting transfer time.
    pub total_delay: SubsecondTime,
}

impl QueueStats {
    pub(crate) fn record(&mut self, bytes: u64, service: SubsecondTime, delay: SubsecondTime) {
        self.packets += 1;
        self.bytes += bytes;
        self.busy_time += service;
        if !delay.is_zero() {
            self.delayed_packets += 1;
            self.total_delay += delay;
        }
    }

    /// Mean queueing delay per reservation.
    pub fn average_delay(&self) -> SubsecondTime {
        if self.packets == 0 {
            SubsecondTime::ZERO
        } else {
            SubsecondTime::from_fs(self.total_delay.as_fs() / self.packets)
        }
    }
}

/// A shared resource with a reservation discipline.
pub trait QueueModel: Send {
    /// Reserves the resource for `bytes` bytes no earlier than `start` and
    /// returns the completion time.
    fn reserve(&mut self, start: SubsecondTime, bytes: u64) -> SubsecondTime;

    fn stats(&self) -> &QueueStats;

    fn model_type(&self) -> QueueModelType;

    /// Statistics as JSON.
    fn export_stats(&self) -> serde_json::Value {
        let stats = self.stats();
        serde_json::json!({
            "type": self.model_type().name(),
            "packets": stats.packets,
            "delayed_packets": stats.delayed_packets,
            "bytes": stats.bytes,
            "busy_time_fs": stats.busy_time.as_fs(),
            "total_delay_fs": stats.total_delay.as_fs(),
        })
    }
}

/// A queue model shared by every thread that uses the resource.
pub type SharedQueueModel = Arc<Mutex<Box<dyn QueueModel>>>;

/// Creates a queue model of the given type over a link of the given bandwidth.
pub fn create_queue_model(
    model_type: QueueModelType,
    bandwidth: ComponentBandwidthPerCycle,
) -> Box<dyn QueueModel> {
    match model_type {
        QueueModelType::Contention => Box::new(ContentionModel::new(bandwidth)),
        QueueModelType::Analytical => Box::new(AnalyticalModel::new(bandwidth)),
    }
}

/// Creates a queue model wrapped for sharing across threads.
pub fn create_shared_queue_model(
    model_type: QueueModelType,
    bandwidth: ComponentBandwidthPerCycle,
) -> SharedQueueModel {
    Arc::new(Mutex::new(create_queue_model(model_type, bandwidth)))
}
