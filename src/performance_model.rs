//! Per-core instruction cost accumulation.
//!
//! The performance model owns its core's clock. Each retired instruction
//! advances the clock by its cost: the instruction's own cost plus the
//! latency of every memory operand, taken from the dynamic information the
//! memory system pushed for it.
//!
//! Retirement is all-or-nothing. If the dynamic information for a memory
//! operand has not arrived yet, or the instruction's cost is not yet known,
//! [`PerformanceModel::handle_instruction`] reports
//! [`Retirement::Pending`] and leaves every counter, the clock, and the
//! info queue exactly as they were, so the caller can retry later.

use serde::Serialize;
use std::collections::VecDeque;
use std::io::{self, Write};
use thiserror::Error;

use crate::branch_predictor::BranchPredictor;
use crate::instruction::{DynamicInfoKind, DynamicInstructionInfo, Instruction, OperandDirection};
use crate::time::{ComponentPeriod, ComponentTime, SubsecondTime};
use crate::types::CoreId;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PerfModelError {
    #[error("core {core}: memory operand {operand} expects a {expected:?} record, found {found:?}")]
    OperandMismatch {
        core: CoreId,
        operand: usize,
        expected: OperandDirection,
        found: DynamicInfoKind,
    },
}

/// Why an instruction could not retire yet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PendingReason {
    /// Fewer dynamic info records queued than the instruction has memory
    /// operands.
    DynamicInfoUnavailable,
    /// The instruction's own cost is not known yet.
    CostUnavailable,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Retirement {
    /// Retired; carries the total cost charged to the clock.
    Retired(SubsecondTime),
    Pending(PendingReason),
}

impl Retirement {
    pub fn is_retired(&self) -> bool {
        matches!(self, Retirement::Retired(_))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct PerformanceSummary {
    pub core_id: CoreId,
    pub instructions: u64,
    pub cycles: u64,
    pub time_ns: u64,
}

pub struct PerformanceModel {
    core_id: CoreId,
    elapsed_time: ComponentTime,
    instruction_count: u64,
    dynamic_info: VecDeque<DynamicInstructionInfo>,
    branch_predictor: Option<Box<dyn BranchPredictor>>,
    enabled: bool,
}

impl PerformanceModel {
    pub fn new(core_id: CoreId, domain: ComponentPeriod) -> Self {
        Self {
            core_id,
            elapsed_time: ComponentTime::new(domain),
            instruction_count: 0,
            dynamic_info: VecDeque::new(),
            branch_predictor: None,
            enabled: true,
        }
    }

    pub fn with_branch_predictor(mut self, predictor: Box<dyn BranchPredictor>) -> Self {
        self.branch_predictor = Some(predictor);
        self
    }

    pub fn core_id(&self) -> CoreId {
        self.core_id
    }

    pub fn branch_predictor(&self) -> Option<&dyn BranchPredictor> {
        self.branch_predictor.as_deref()
    }

    /// While disabled, instructions retire at no cost and nothing is counted.
    pub fn enable(&mut self) {
        self.enabled = true;
    }

    pub fn disable(&mut self) {
        self.enabled = false;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Queues run-time information for the next memory operand.
    pub fn push_dynamic_instruction_info(&mut self, info: DynamicInstructionInfo) {
        self.dynamic_info.push_back(info);
    }

    pub fn pending_dynamic_info(&self) -> usize {
        self.dynamic_info.len()
    }

    pub fn clear_dynamic_instruction_info(&mut self) {
        self.dynamic_info.clear();
    }

    /// Retires `instruction` if everything it needs is available.
    ///
    /// A dynamic info record whose kind does not match the operand direction
    /// is a consistency error between the instrumentation and the memory
    /// system; the model is left unchanged and the error returned.
    pub fn handle_instruction(&mut self, instruction: &Instruction) -> Result<Retirement, PerfModelError> {
        if !self.enabled {
            return Ok(Retirement::Retired(SubsecondTime::ZERO));
        }

        let memory_operands = instruction.memory_operand_count();
        if self.dynamic_info.len() < memory_operands {
            return Ok(Retirement::Pending(PendingReason::DynamicInfoUnavailable));
        }
        let own_cost = match instruction.cost(self.elapsed_time.period()) {
            Some(cost) => cost,
            None => return Ok(Retirement::Pending(PendingReason::CostUnavailable)),
        };

        let mut cost = self.elapsed_time.latency_generator();
        let operands = instruction.operands.iter().filter(|o| o.is_memory());
        for (operand, (info, index)) in operands.zip(self.dynamic_info.iter().zip(0..)) {
            if info.kind.direction() != operand.direction {
                return Err(PerfModelError::OperandMismatch {
                    core: self.core_id,
                    operand: index,
                    expected: operand.direction,
                    found: info.kind,
                });
            }
            cost.add_latency(info.latency);
        }
        cost.add_latency(own_cost);

        self.dynamic_info.drain(..memory_operands);

        if let (Some(predictor), Some(branch)) = (self.branch_predictor.as_mut(), instruction.branch) {
            let prediction = predictor.predict(branch.address);
            predictor.update(branch.address, prediction, branch.taken);
        }

        self.instruction_count += 1;
        self.elapsed_time += cost;
        Ok(Retirement::Retired(cost.elapsed()))
    }

    pub fn instruction_count(&self) -> u64 {
        self.instruction_count
    }

    pub fn elapsed_time(&self) -> SubsecondTime {
        self.elapsed_time.elapsed()
    }

    pub fn cycle_count(&self) -> u64 {
        self.elapsed_time.cycle_count()
    }

    pub fn period(&self) -> ComponentPeriod {
        self.elapsed_time.period()
    }

    /// Moves the clock to `time`.
    ///
    /// # Panics
    ///
    /// Panics if `time` is earlier than the current elapsed time, unless the
    /// clock is still at zero.
    pub fn set_elapsed_time(&mut self, time: SubsecondTime) {
        self.elapsed_time.set_elapsed_time(time);
    }

    pub fn increment_elapsed_time(&mut self, time: SubsecondTime) {
        self.elapsed_time.add_latency(time);
    }

    pub fn summary(&self) -> PerformanceSummary {
        PerformanceSummary {
            core_id: self.core_id,
            instructions: self.instruction_count,
            cycles: self.cycle_count(),
            time_ns: self.elapsed_time().as_ns(),
        }
    }

    pub fn output_summary(&self, out: &mut dyn Write) -> io::Result<()> {
        writeln!(out, "  Instructions: {}", self.instruction_count)?;
        writeln!(out, "  Cycles: {}", self.cycle_count())?;
        writeln!(out, "  Time: {}", self.elapsed_time().as_ns())?;
        if let Some(predictor) = &self.branch_predictor {
            predictor.output_summary(out)?;
        }
        Ok(())
    }
}
