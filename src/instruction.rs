//! Instructions as seen by the performance model.
//!
//! The timing core never decodes instructions. The instrumentation layer
//! hands it an [`Instruction`] carrying a type tag, a cost, and the list of
//! operands; memory operands are matched at retirement against
//! [`DynamicInstructionInfo`] records pushed separately.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::StaticInstructionCosts;
use crate::time::{ComponentPeriod, SubsecondTime};

/// Instruction type tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstructionType {
    Generic,
    Add,
    Sub,
    Mul,
    Div,
    #[serde(rename = "fadd")]
    FAdd,
    #[serde(rename = "fsub")]
    FSub,
    #[serde(rename = "fmul")]
    FMul,
    #[serde(rename = "fdiv")]
    FDiv,
    Jmp,
    Branch,
    /// Stall waiting for a network message.
    Recv,
    /// Stall on a synchronization primitive.
    Sync,
    Spawn,
    /// Any other instruction whose cost is measured at run time.
    DynamicMisc,
}

impl InstructionType {
    /// Types costed from the static cost table.
    pub const STATIC: &'static [InstructionType] = &[
        InstructionType::Generic,
        InstructionType::Add,
        InstructionType::Sub,
        InstructionType::Mul,
        InstructionType::Div,
        InstructionType::FAdd,
        InstructionType::FSub,
        InstructionType::FMul,
        InstructionType::FDiv,
        InstructionType::Jmp,
        InstructionType::Branch,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            InstructionType::Generic => "generic",
            InstructionType::Add => "add",
            InstructionType::Sub => "sub",
            InstructionType::Mul => "mul",
            InstructionType::Div => "div",
            InstructionType::FAdd => "fadd",
            InstructionType::FSub => "fsub",
            InstructionType::FMul => "fmul",
            InstructionType::FDiv => "fdiv",
            InstructionType::Jmp => "jmp",
            InstructionType::Branch => "branch",
            InstructionType::Recv => "recv",
            InstructionType::Sync => "sync",
            InstructionType::Spawn => "spawn",
            InstructionType::DynamicMisc => "dynamic_misc",
        }
    }

    pub fn is_static(&self) -> bool {
        Self::STATIC.contains(self)
    }

    /// Built-in cycle cost used when the configuration does not override it.
    pub fn default_cycles(&self) -> u64 {
        match self {
            InstructionType::Mul | InstructionType::FAdd | InstructionType::FSub => 3,
            InstructionType::FMul => 5,
            InstructionType::Div | InstructionType::FDiv => 18,
            _ => 1,
        }
    }
}

impl fmt::Display for InstructionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperandType {
    Memory,
    Other,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperandDirection {
    Read,
    Write,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operand {
    pub operand_type: OperandType,
    pub direction: OperandDirection,
}

impl Operand {
    pub fn memory_read() -> Self {
        Self {
            operand_type: OperandType::Memory,
            direction: OperandDirection::Read,
        }
    }

    pub fn memory_write() -> Self {
        Self {
            operand_type: OperandType::Memory,
            direction: OperandDirection::Write,
        }
    }

    pub fn register(direction: OperandDirection) -> Self {
        Self {
            operand_type: OperandType::Other,
            direction,
        }
    }

    pub fn is_memory(&self) -> bool {
        self.operand_type == OperandType::Memory
    }
}

/// Cost of an instruction before memory operand latencies are added.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstructionCost {
    /// Cycles in the retiring core's clock domain.
    Cycles(u64),
    /// A fixed duration, independent of the core's frequency.
    Fixed(SubsecondTime),
    /// Not known yet; the instruction cannot retire until it is.
    Unavailable,
}

/// Outcome of a conditional branch, for the branch predictor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchOutcome {
    pub address: u64,
    pub taken: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    pub instruction_type: InstructionType,
    pub cost: InstructionCost,
    pub operands: Vec<Operand>,
    pub branch: Option<BranchOutcome>,
}

impl Instruction {
    pub fn new(instruction_type: InstructionType, cost: InstructionCost, operands: Vec<Operand>) -> Self {
        Self {
            instruction_type,
            cost,
            operands,
            branch: None,
        }
    }

    /// Builds an instruction costed from the static cost table. Types
    /// missing from the table are [`InstructionCost::Unavailable`].
    pub fn from_table(
        instruction_type: InstructionType,
        operands: Vec<Operand>,
        costs: &StaticInstructionCosts,
    ) -> Self {
        let cost = match costs.get(instruction_type) {
            Some(cycles) => InstructionCost::Cycles(cycles),
            None => InstructionCost::Unavailable,
        };
        Self::new(instruction_type, cost, operands)
    }

    /// A conditional branch at `address`.
    pub fn branch(address: u64, taken: bool, costs: &StaticInstructionCosts) -> Self {
        let mut instruction = Self::from_table(InstructionType::Branch, Vec::new(), costs);
        instruction.branch = Some(BranchOutcome { address, taken });
        instruction
    }

    /// A receive stall of the given length.
    pub fn recv(stall: SubsecondTime) -> Self {
        Self::new(InstructionType::Recv, InstructionCost::Fixed(stall), Vec::new())
    }

    /// A synchronization stall of the given length.
    pub fn sync(stall: SubsecondTime) -> Self {
        Self::new(InstructionType::Sync, InstructionCost::Fixed(stall), Vec::new())
    }

    /// Number of memory operands, i.e. dynamic info records consumed.
    pub fn memory_operand_count(&self) -> usize {
        self.operands.iter().filter(|o| o.is_memory()).count()
    }

    /// Cost in the given clock domain, `None` while unavailable.
    pub fn cost(&self, period: ComponentPeriod) -> Option<SubsecondTime> {
        match self.cost {
            InstructionCost::Cycles(cycles) => Some(period.cycles_to_time(cycles)),
            InstructionCost::Fixed(time) => Some(time),
            InstructionCost::Unavailable => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DynamicInfoKind {
    MemoryRead,
    MemoryWrite,
}

impl DynamicInfoKind {
    /// The operand direction this record satisfies.
    pub fn direction(&self) -> OperandDirection {
        match self {
            DynamicInfoKind::MemoryRead => OperandDirection::Read,
            DynamicInfoKind::MemoryWrite => OperandDirection::Write,
        }
    }
}

/// Run-time information for one memory operand, produced by the memory
/// system and consumed once at retirement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DynamicInstructionInfo {
    pub kind: DynamicInfoKind,
    pub latency: SubsecondTime,
    pub address: u64,
}

impl DynamicInstructionInfo {
    pub fn memory_read(latency: SubsecondTime, address: u64) -> Self {
        Self {
            kind: DynamicInfoKind::MemoryRead,
            latency,
            address,
        }
    }

    pub fn memory_write(latency: SubsecondTime, address: u64) -> Self {
        Self {
            kind: DynamicInfoKind::MemoryWrite,
            latency,
            address,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_types() {
        assert!(InstructionType::Add.is_static());
        assert!(!InstructionType::Recv.is_static());
        assert_eq!(InstructionType::FDiv.name(), "fdiv");
    }

    #[test]
    fn test_cost_from_table() {
        let mut costs = StaticInstructionCosts::default();
        costs.set(InstructionType::Mul, 7);
        let period = ComponentPeriod::from_ghz(2.0).unwrap();

        let mul = Instruction::from_table(InstructionType::Mul, vec![], &costs);
        assert_eq!(mul.cost(period), Some(SubsecondTime::from_ps(3_500)));

        let spawn = Instruction::from_table(InstructionType::Spawn, vec![], &costs);
        assert_eq!(spawn.cost, InstructionCost::Unavailable);
        assert_eq!(spawn.cost(period), None);
    }

    #[test]
    fn test_fixed_cost_ignores_frequency() {
        let stall = SubsecondTime::from_ns(40);
        let recv = Instruction::recv(stall);
        assert_eq!(recv.cost(ComponentPeriod::from_ghz(1.0).unwrap()), Some(stall));
        assert_eq!(recv.cost(ComponentPeriod::from_ghz(3.0).unwrap()), Some(stall));
    }

    #[test]
    fn test_memory_operand_count() {
        let ins = Instruction::new(
            InstructionType::Generic,
            InstructionCost::Cycles(1),
            vec![
                Operand::memory_read(),
                Operand::register(OperandDirection::Write),
                Operand::memory_write(),
            ],
        );
        assert_eq!(ins.memory_operand_count(), 2);
    }
}
