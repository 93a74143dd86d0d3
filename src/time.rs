//! Sub-cycle time representation and per-domain clocks.
//!
//! All simulated time is kept as a [`SubsecondTime`], an integer count of
//! femtoseconds. Clock domains are described by their period
//! ([`ComponentPeriod`]); conversions between a domain's cycle count and the
//! global time value always truncate, so that
//! `from_cycles(to_cycles(t))` is idempotent.
//!
//! # Example
//!
//! ```
//! use coresim::time::{ComponentPeriod, ComponentTime, SubsecondTime};
//!
//! let domain = ComponentPeriod::from_ghz(2.0).unwrap();
//! let mut clock = ComponentTime::new(domain);
//! clock.add_cycles(10);
//! assert_eq!(clock.elapsed(), SubsecondTime::from_ns(5));
//! assert_eq!(clock.cycle_count(), 10);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};

/// Femtoseconds per picosecond.
pub const FS_PER_PS: u64 = 1_000;
/// Femtoseconds per nanosecond.
pub const FS_PER_NS: u64 = 1_000_000;
/// Femtoseconds per microsecond.
pub const FS_PER_US: u64 = 1_000_000_000;

/// A duration or timestamp with femtosecond resolution.
///
/// Arithmetic is checked: overflow and negative durations are simulation
/// correctness bugs and abort with a diagnostic instead of wrapping.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SubsecondTime(u64);

impl SubsecondTime {
    /// The zero time value.
    pub const ZERO: SubsecondTime = SubsecondTime(0);

    /// The largest representable time value.
    pub const MAX: SubsecondTime = SubsecondTime(u64::MAX);

    /// Returns the zero time value.
    pub const fn zero() -> Self {
        Self::ZERO
    }

    pub const fn from_fs(fs: u64) -> Self {
        SubsecondTime(fs)
    }

    pub const fn from_ps(ps: u64) -> Self {
        Self::scaled(ps, FS_PER_PS)
    }

    pub const fn from_ns(ns: u64) -> Self {
        Self::scaled(ns, FS_PER_NS)
    }

    pub const fn from_us(us: u64) -> Self {
        Self::scaled(us, FS_PER_US)
    }

    const fn scaled(count: u64, unit_fs: u64) -> Self {
        match count.checked_mul(unit_fs) {
            Some(fs) => SubsecondTime(fs),
            None => panic!("SubsecondTime overflow converting to femtoseconds"),
        }
    }

    /// Builds a time value from a cycle count in the given clock domain.
    pub fn from_cycles(count: u64, period: ComponentPeriod) -> Self {
        period.cycles_to_time(count)
    }

    /// Raw femtosecond count.
    pub const fn as_fs(&self) -> u64 {
        self.0
    }

    /// Picoseconds, truncated.
    pub const fn as_ps(&self) -> u64 {
        self.0 / FS_PER_PS
    }

    /// Nanoseconds, truncated.
    pub const fn as_ns(&self) -> u64 {
        self.0 / FS_PER_NS
    }

    /// Number of whole cycles of `period` contained in this time value.
    pub fn to_cycles(&self, period: ComponentPeriod) -> u64 {
        period.time_to_cycles(*self)
    }

    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, rhs: SubsecondTime) -> Option<SubsecondTime> {
        self.0.checked_add(rhs.0).map(SubsecondTime)
    }

    pub fn checked_sub(self, rhs: SubsecondTime) -> Option<SubsecondTime> {
        self.0.checked_sub(rhs.0).map(SubsecondTime)
    }

    /// Difference clamped at zero.
    pub fn saturating_sub(self, rhs: SubsecondTime) -> SubsecondTime {
        SubsecondTime(self.0.saturating_sub(rhs.0))
    }
}

impl Add for SubsecondTime {
    type Output = SubsecondTime;

    fn add(self, rhs: SubsecondTime) -> SubsecondTime {
        match self.checked_add(rhs) {
            Some(sum) => sum,
            None => panic!("SubsecondTime overflow: {} + {}", self, rhs),
        }
    }
}

impl AddAssign for SubsecondTime {
    fn add_assign(&mut self, rhs: SubsecondTime) {
        *self = *self + rhs;
    }
}

impl Sub for SubsecondTime {
    type Output = SubsecondTime;

    fn sub(self, rhs: SubsecondTime) -> SubsecondTime {
        match self.checked_sub(rhs) {
            Some(diff) => diff,
            None => panic!("SubsecondTime underflow: {} - {}", self, rhs),
        }
    }
}

impl SubAssign for SubsecondTime {
    fn sub_assign(&mut self, rhs: SubsecondTime) {
        *self = *self - rhs;
    }
}

impl Mul<u64> for SubsecondTime {
    type Output = SubsecondTime;

    fn mul(self, rhs: u64) -> SubsecondTime {
        match self.0.checked_mul(rhs) {
            Some(product) => SubsecondTime(product),
            None => panic!("SubsecondTime overflow: {} * {}", self, rhs),
        }
    }
}

impl Sum for SubsecondTime {
    fn sum<I: Iterator<Item = SubsecondTime>>(iter: I) -> SubsecondTime {
        iter.fold(SubsecondTime::ZERO, |acc, t| acc + t)
    }
}

impl fmt::Display for SubsecondTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}fs", self.0)
    }
}

/// The clock period of a frequency domain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ComponentPeriod {
    period: SubsecondTime,
}

impl ComponentPeriod {
    /// Creates a domain from its frequency in GHz.
    ///
    /// Returns `None` for non-finite, non-positive, or absurdly high
    /// frequencies (period rounding to zero femtoseconds).
    pub fn from_ghz(ghz: f64) -> Option<Self> {
        if !ghz.is_finite() || ghz <= 0.0 {
            return None;
        }
        let fs = (FS_PER_NS as f64 / ghz).round();
        if fs < 1.0 || fs >= u64::MAX as f64 {
            return None;
        }
        Some(Self {
            period: SubsecondTime::from_fs(fs as u64),
        })
    }

    /// Creates a domain directly from its period. Returns `None` for a zero
    /// period.
    pub fn from_period(period: SubsecondTime) -> Option<Self> {
        if period.is_zero() {
            None
        } else {
            Some(Self { period })
        }
    }

    pub fn period(&self) -> SubsecondTime {
        self.period
    }

    pub fn freq_ghz(&self) -> f64 {
        FS_PER_NS as f64 / self.period.as_fs() as f64
    }

    pub fn cycles_to_time(&self, cycles: u64) -> SubsecondTime {
        self.period * cycles
    }

    /// Whole cycles in `time`, truncated.
    pub fn time_to_cycles(&self, time: SubsecondTime) -> u64 {
        time.as_fs() / self.period.as_fs()
    }
}

/// Elapsed time of one component in one clock domain.
///
/// Owned by exactly one model (single writer). The only way to move the
/// clock backwards is from its initial zero state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ComponentTime {
    period: ComponentPeriod,
    elapsed: SubsecondTime,
}

impl ComponentTime {
    /// Creates a clock at time zero in the given domain.
    pub fn new(period: ComponentPeriod) -> Self {
        Self {
            period,
            elapsed: SubsecondTime::ZERO,
        }
    }

    /// Returns a fresh zero-valued clock in the same domain, used as a cost
    /// accumulator.
    pub fn latency_generator(&self) -> ComponentTime {
        ComponentTime::new(self.period)
    }

    pub fn elapsed(&self) -> SubsecondTime {
        self.elapsed
    }

    pub fn period(&self) -> ComponentPeriod {
        self.period
    }

    pub fn cycle_count(&self) -> u64 {
        self.elapsed.to_cycles(self.period)
    }

    pub fn add_latency(&mut self, latency: SubsecondTime) {
        self.elapsed += latency;
    }

    pub fn add_cycles(&mut self, cycles: u64) {
        self.elapsed += self.period.cycles_to_time(cycles);
    }

    /// Moves the clock to `time`.
    ///
    /// # Panics
    ///
    /// Panics if `time` is earlier than the current elapsed time, unless the
    /// clock is still at zero.
    pub fn set_elapsed_time(&mut self, time: SubsecondTime) {
        assert!(
            time >= self.elapsed || self.elapsed.is_zero(),
            "Cannot move clock backwards: time({}) < elapsed({})",
            time,
            self.elapsed
        );
        self.elapsed = time;
    }

    /// Resets the clock to zero.
    pub fn reset(&mut self) {
        self.elapsed = SubsecondTime::ZERO;
    }
}

impl AddAssign<ComponentTime> for ComponentTime {
    fn add_assign(&mut self, rhs: ComponentTime) {
        self.add_latency(rhs.elapsed);
    }
}

/// A latency expressed in cycles of a given domain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ComponentLatency {
    period: ComponentPeriod,
    cycles: u64,
}

impl ComponentLatency {
    pub fn new(period: ComponentPeriod, cycles: u64) -> Self {
        Self { period, cycles }
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn latency(&self) -> SubsecondTime {
        self.period.cycles_to_time(self.cycles)
    }
}

/// Link bandwidth in bits per cycle of a given domain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ComponentBandwidthPerCycle {
    period: ComponentPeriod,
    bits_per_cycle: u64,
}

impl ComponentBandwidthPerCycle {
    /// Returns `None` for a zero bandwidth.
    pub fn new(period: ComponentPeriod, bits_per_cycle: u64) -> Option<Self> {
        if bits_per_cycle == 0 {
            None
        } else {
            Some(Self {
                period,
                bits_per_cycle,
            })
        }
    }

    pub fn bits_per_cycle(&self) -> u64 {
        self.bits_per_cycle
    }

    pub fn period(&self) -> ComponentPeriod {
        self.period
    }

    /// Cycles needed to push `bits` through the link, rounded up.
    pub fn rounded_cycles(&self, bits: u64) -> u64 {
        bits.div_ceil(self.bits_per_cycle)
    }

    /// Time needed to push `bits` through the link, rounded up to a whole
    /// cycle.
    pub fn rounded_latency(&self, bits: u64) -> SubsecondTime {
        self.period.cycles_to_time(self.rounded_cycles(bits))
    }
}
