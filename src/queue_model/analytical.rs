//! Analytical (M/D/1) queue model.
//!
//! Instead of tracking the exact free time of the resource, this model
//! estimates the queueing delay from the utilization observed so far:
//!
//! ```text
//! rho   = busy_time / observed_window
//! delay = rho / (2 * (1 - rho)) * service_time
//! ```
//!
//! Utilization is clamped below one so that a saturated resource yields a
//! large but finite delay. The estimate is insensitive to the order in which
//! requests arrive, which makes it usable for loosely synchronized cores.

use super::{QueueModel, QueueModelType, QueueStats};
use crate::time::{ComponentBandwidthPerCycle, SubsecondTime};

const MAX_UTILIZATION: f64 = 0.99;

#[derive(Debug)]
pub struct AnalyticalModel {
    bandwidth: ComponentBandwidthPerCycle,
    first_arrival: Option<SubsecondTime>,
    last_arrival: SubsecondTime,
    stats: QueueStats,
}

impl AnalyticalModel {
    pub fn new(bandwidth: ComponentBandwidthPerCycle) -> Self {
        Self {
            bandwidth,
            first_arrival: None,
            last_arrival: SubsecondTime::ZERO,
            stats: QueueStats::default(),
        }
    }

    /// Utilization observed so far, in `[0, MAX_UTILIZATION]`.
    pub fn utilization(&self) -> f64 {
        let first = match self.first_arrival {
            Some(t) => t,
            None => return 0.0,
        };
        let window = self.last_arrival.saturating_sub(first);
        if window.is_zero() {
            return 0.0;
        }
        let rho = self.stats.busy_time.as_fs() as f64 / window.as_fs() as f64;
        rho.min(MAX_UTILIZATION)
    }

    fn estimate_delay(&self, service: SubsecondTime) -> SubsecondTime {
        let rho = self.utilization();
        let factor = rho / (2.0 * (1.0 - rho));
        SubsecondTime::from_fs((factor * service.as_fs() as f64) as u64)
    }
}

impl QueueModel for AnalyticalModel {
    fn reserve(&mut self, start: SubsecondTime, bytes: u64) -> SubsecondTime {
        let service = self.bandwidth.rounded_latency(bytes * 8);
        let delay = self.estimate_delay(service);

        if self.first_arrival.is_none() {
            self.first_arrival = Some(start);
        }
        self.last_arrival = self.last_arrival.max(start);
        self.stats.record(bytes, service, delay);

        start + delay + service
    }

    fn stats(&self) -> &QueueStats {
        &self.stats
    }

    fn model_type(&self) -> QueueModelType {
        QueueModelType::Analytical
    }
}
