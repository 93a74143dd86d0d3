//! Exact contention model.
//!
//! The resource is described by a single horizon, the time at which it next
//! becomes free. A reservation starts at `max(start, free_time)`, holds the
//! resource for the transfer time, and moves the horizon to its completion.
//! Reservations are therefore served in call order, which is the order the
//! shared lock hands them out.

use super::{QueueModel, QueueModelType, QueueStats};
use crate::time::{ComponentBandwidthPerCycle, SubsecondTime};

#[derive(Debug)]
pub struct ContentionModel {
    bandwidth: ComponentBandwidthPerCycle,
    free_time: SubsecondTime,
    stats: QueueStats,
}

impl ContentionModel {
    pub fn new(bandwidth: ComponentBandwidthPerCycle) -> Self {
        Self {
            bandwidth,
            free_time: SubsecondTime::ZERO,
            stats: QueueStats::default(),
        }
    }

    /// Time at which the resource next becomes free.
    pub fn free_time(&self) -> SubsecondTime {
        self.free_time
    }

    pub fn bandwidth(&self) -> ComponentBandwidthPerCycle {
        self.bandwidth
    }
}

impl QueueModel for ContentionModel {
    fn reserve(&mut self, start: SubsecondTime, bytes: u64) -> SubsecondTime {
        let service = self.bandwidth.rounded_latency(bytes * 8);
        let begin = start.max(self.free_time);
        let completion = begin + service;

        self.stats.record(bytes, service, begin - start);
        self.free_time = completion;
        completion
    }

    fn stats(&self) -> &QueueStats {
        &self.stats
    }

    fn model_type(&self) -> QueueModelType {
        QueueModelType::Contention
    }
}
