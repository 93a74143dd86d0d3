//! Integration tests for instruction retirement and core clocks.

use std::panic::{self, AssertUnwindSafe};

use coresim::branch_predictor::OneBitBranchPredictor;
use coresim::config::StaticInstructionCosts;
use coresim::performance_model::PendingReason;
use coresim::{
    ComponentPeriod, ComponentTime, DynamicInstructionInfo, Instruction, InstructionCost, InstructionType,
    Operand, PerfModelError, PerformanceModel, Retirement, SubsecondTime,
};

fn model_at(ghz: f64) -> PerformanceModel {
    PerformanceModel::new(0, ComponentPeriod::from_ghz(ghz).unwrap())
}

fn load(cycles: u64) -> Instruction {
    Instruction::new(InstructionType::Generic, InstructionCost::Cycles(cycles), vec![Operand::memory_read()])
}

// ============================================================================
// Retirement
// ============================================================================

#[test]
fn test_pending_until_info_arrives() {
    let mut model = model_at(1.0);
    let instruction = Instruction::new(
        InstructionType::Generic,
        InstructionCost::Cycles(2),
        vec![Operand::memory_read(), Operand::memory_write()],
    );

    model.push_dynamic_instruction_info(DynamicInstructionInfo::memory_read(SubsecondTime::from_ns(7), 0x40));

    // Retrying while incomplete never changes anything.
    for _ in 0..3 {
        assert_eq!(
            model.handle_instruction(&instruction),
            Ok(Retirement::Pending(PendingReason::DynamicInfoUnavailable))
        );
        assert_eq!(model.instruction_count(), 0);
        assert_eq!(model.elapsed_time(), SubsecondTime::ZERO);
        assert_eq!(model.pending_dynamic_info(), 1);
    }

    model.push_dynamic_instruction_info(DynamicInstructionInfo::memory_write(SubsecondTime::from_ns(3), 0x80));
    assert_eq!(
        model.handle_instruction(&instruction),
        Ok(Retirement::Retired(SubsecondTime::from_ns(12)))
    );
    assert_eq!(model.instruction_count(), 1);
    assert_eq!(model.pending_dynamic_info(), 0);
}

#[test]
fn test_unavailable_cost_is_pending() {
    let mut model = model_at(1.0);
    let unknown = Instruction::new(InstructionType::DynamicMisc, InstructionCost::Unavailable, vec![]);

    assert_eq!(
        model.handle_instruction(&unknown),
        Ok(Retirement::Pending(PendingReason::CostUnavailable))
    );
    assert_eq!(model.instruction_count(), 0);
}

#[test]
fn test_mismatched_info_leaves_model_unchanged() {
    let mut model = model_at(1.0);
    model.push_dynamic_instruction_info(DynamicInstructionInfo::memory_write(SubsecondTime::from_ns(5), 0));

    let err = model.handle_instruction(&load(1)).unwrap_err();
    assert!(matches!(err, PerfModelError::OperandMismatch { core: 0, operand: 0, .. }));
    assert_eq!(model.pending_dynamic_info(), 1);
    assert_eq!(model.elapsed_time(), SubsecondTime::ZERO);
}

#[test]
fn test_info_consumed_in_order() {
    let mut model = model_at(1.0);
    for latency in [10, 20, 30] {
        model.push_dynamic_instruction_info(DynamicInstructionInfo::memory_read(SubsecondTime::from_ns(latency), 0));
    }

    let costs: Vec<_> = (0..3).map(|_| model.handle_instruction(&load(0)).unwrap()).collect();
    assert_eq!(
        costs,
        vec![
            Retirement::Retired(SubsecondTime::from_ns(10)),
            Retirement::Retired(SubsecondTime::from_ns(20)),
            Retirement::Retired(SubsecondTime::from_ns(30)),
        ]
    );
    assert_eq!(model.elapsed_time(), SubsecondTime::from_ns(60));
}

// ============================================================================
// Clock domains
// ============================================================================

#[test]
fn test_cycles_follow_core_frequency() {
    let mut fast = model_at(2.0);
    let mut slow = model_at(0.5);
    let add = Instruction::new(InstructionType::Add, InstructionCost::Cycles(4), vec![]);

    fast.handle_instruction(&add).unwrap();
    slow.handle_instruction(&add).unwrap();

    assert_eq!(fast.elapsed_time(), SubsecondTime::from_ns(2));
    assert_eq!(slow.elapsed_time(), SubsecondTime::from_ns(8));
    assert_eq!(fast.cycle_count(), 4);
    assert_eq!(slow.cycle_count(), 4);
}

#[test]
fn test_fixed_costs_ignore_frequency() {
    let mut model = model_at(3.0);
    model.handle_instruction(&Instruction::recv(SubsecondTime::from_ns(9))).unwrap();
    assert_eq!(model.elapsed_time(), SubsecondTime::from_ns(9));
    assert_eq!(model.cycle_count(), 27);
}

#[test]
fn test_clock_only_moves_forward() {
    let mut model = model_at(1.0);
    model.set_elapsed_time(SubsecondTime::from_ns(100));
    model.increment_elapsed_time(SubsecondTime::from_ns(5));
    assert_eq!(model.elapsed_time(), SubsecondTime::from_ns(105));

    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        model.set_elapsed_time(SubsecondTime::from_ns(50));
    }));
    assert!(result.is_err());
}

#[test]
fn test_component_time_latency_generator() {
    let period = ComponentPeriod::from_ghz(1.0).unwrap();
    let mut clock = ComponentTime::new(period);
    clock.add_cycles(10);

    let mut latency = clock.latency_generator();
    latency.add_cycles(3);
    assert_eq!(latency.elapsed(), SubsecondTime::from_ns(3));

    clock += latency;
    assert_eq!(clock.elapsed(), SubsecondTime::from_ns(13));
}

// ============================================================================
// Static costs and branches
// ============================================================================

#[test]
fn test_static_cost_table() {
    let mut costs = StaticInstructionCosts::default();
    costs.set(InstructionType::FDiv, 20);

    let mut model = model_at(1.0);
    model
        .handle_instruction(&Instruction::from_table(InstructionType::FDiv, vec![], &costs))
        .unwrap();
    assert_eq!(model.elapsed_time(), SubsecondTime::from_ns(20));
}

#[test]
fn test_branches_train_predictor() {
    let costs = StaticInstructionCosts::default();
    let mut model = model_at(1.0).with_branch_predictor(Box::new(OneBitBranchPredictor::new(64)));

    for _ in 0..10 {
        model.handle_instruction(&Instruction::branch(0x400, true, &costs)).unwrap();
    }

    let stats = model.branch_predictor().unwrap().stats();
    assert_eq!(stats.correct + stats.incorrect, 10);
    // Only the first prediction of a cold entry can miss.
    assert!(stats.incorrect <= 1);
}
