//! Per-frame condition evaluation and the hit-count state machine
//!
//! Evaluation is single-threaded, synchronous, and allocation-free: the
//! host refreshes the shared memory-reference chain once per frame, then
//! every condition is stepped in order, feeding the accumulators that the
//! modifier condition types (AddSource, AddAddress, AddHits, AndNext, ...)
//! hand to their successors. There are no run-time failures; division by
//! zero and missing memory degrade to 0.

use crate::condition::operand::Operand;
use crate::condition::types::{
    Condition, ConditionGroup, ConditionOperator, ConditionType, Trigger,
};
use crate::memory::{MemoryPeek, MemrefPool};

/// How a pending AndNext/OrNext result folds into the next test
#[derive(Debug, Clone, Copy)]
enum ChainOp {
    And,
    Or,
}

/// Ephemeral accumulator state for one pass over a condition group
pub struct EvalState<'a> {
    /// Value set by AddSource/SubSource, consumed by the next tested
    /// condition's first operand and then cleared
    pub add_value: u32,
    /// Address offset applied to indirect references of the condition
    /// following an AddAddress
    pub add_address: u32,
    /// Signed hit delta set by AddHits/SubHits, consumed by the next
    /// condition's hit test
    pub add_hits: i64,
    peek: Option<&'a dyn MemoryPeek>,
    chain: Option<(bool, ChainOp)>,
    paused: bool,
    reset_next: bool,
    measured_allowed: bool,
}

impl<'a> EvalState<'a> {
    /// Fresh state for one frame pass over one group
    pub fn new(peek: Option<&'a dyn MemoryPeek>) -> Self {
        Self {
            add_value: 0,
            add_address: 0,
            add_hits: 0,
            peek,
            chain: None,
            paused: false,
            reset_next: false,
            measured_allowed: true,
        }
    }
}

/// Outcome of evaluating one condition group for one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupResult {
    /// Whether every gating condition in the group is satisfied
    pub value: bool,
    /// Whether a PauseIf suspended hit counting this frame
    pub paused: bool,
    /// Whether a ResetIf requested a hit reset
    pub reset: bool,
    /// Progress reported by a Measured condition (frozen while a
    /// MeasuredIf is false)
    pub measured: u32,
    /// Target the measured value is progressing toward
    pub measured_target: u32,
    /// Whether the measured value is presented as a percentage
    pub measured_as_percent: bool,
    /// Whether the group contains Trigger-type conditions
    pub has_trigger: bool,
    /// Whether every gating condition other than the Trigger-type ones is
    /// satisfied (equals `value` for groups without Trigger conditions)
    pub primed: bool,
}

/// Compute the numeric value of `operand1 ⊗ operand2`.
///
/// Unsigned 32-bit multiplication wraps; this deliberately reproduces
/// two's-complement behavior for "negative" factors (`3 * 0xFFFFFFFE`
/// is `0xFFFFFFFA`, i.e. -6). Division by zero yields 0. A floating
/// factor multiplies/divides in f64 and truncates toward zero.
fn apply_arithmetic(value1: u32, op: ConditionOperator, operand2: &Operand, value2: u32) -> u32 {
    match op {
        ConditionOperator::Multiply => match operand2 {
            Operand::Float(f) => (value1 as f64 * f) as i64 as u32,
            _ => value1.wrapping_mul(value2),
        },
        ConditionOperator::Divide => match operand2 {
            Operand::Float(f) => {
                if *f == 0.0 {
                    0
                } else {
                    (value1 as f64 / f) as i64 as u32
                }
            }
            _ => {
                if value2 == 0 {
                    0
                } else {
                    value1 / value2
                }
            }
        },
        ConditionOperator::BitwiseAnd => value1 & value2,
        _ => value1,
    }
}

/// Value contributed by a modifying condition (AddSource, SubSource,
/// AddAddress): its own operand pair combined, without the value
/// accumulator.
fn modifier_value(cond: &Condition, pool: &mut MemrefPool, state: &EvalState<'_>) -> u32 {
    let value1 = cond.operand1.evaluate(pool, state.add_address, state.peek);
    let value2 = cond.operand2.evaluate(pool, state.add_address, state.peek);
    apply_arithmetic(value1, cond.operator, &cond.operand2, value2)
}

impl ConditionGroup {
    /// Advance every condition in this group by one frame.
    ///
    /// The shared entries of `pool` must already have been refreshed for
    /// this frame; indirect entries refresh lazily in here.
    pub fn evaluate(&mut self, pool: &mut MemrefPool, peek: Option<&dyn MemoryPeek>) -> GroupResult {
        let mut state = EvalState::new(peek);
        let mut value = true;
        let mut primed = true;
        let mut has_trigger = false;
        let mut reset = false;
        let mut measured_update: Option<u32> = None;
        let mut measured_target = 0u32;
        let mut measured_as_percent = false;

        for cond in &mut self.conditions {
            match cond.cond_type {
                ConditionType::AddSource => {
                    let v = modifier_value(cond, pool, &state);
                    state.add_value = state.add_value.wrapping_add(v);
                    continue;
                }
                ConditionType::SubSource => {
                    let v = modifier_value(cond, pool, &state);
                    state.add_value = state.add_value.wrapping_sub(v);
                    continue;
                }
                ConditionType::AddAddress => {
                    let v = modifier_value(cond, pool, &state);
                    state.add_address = state.add_address.wrapping_add(v);
                    continue;
                }
                _ => {}
            }

            // Tested condition: operand1 consumes the value accumulator,
            // which is spent after at most one use.
            let value1 = cond
                .operand1
                .evaluate(pool, state.add_address, state.peek)
                .wrapping_add(state.add_value);
            let value2 = cond.operand2.evaluate(pool, state.add_address, state.peek);
            state.add_value = 0;
            // The address offset only reaches the condition directly after
            // its AddAddress chain.
            state.add_address = 0;

            let numeric = apply_arithmetic(value1, cond.operator, &cond.operand2, value2);
            let mut test = cond.operator.compare(value1, value2);

            if let Some((pending, op)) = state.chain.take() {
                test = match op {
                    ChainOp::And => pending && test,
                    ChainOp::Or => pending || test,
                };
            }

            match cond.cond_type {
                ConditionType::AndNext => {
                    state.chain = Some((test, ChainOp::And));
                    continue;
                }
                ConditionType::OrNext => {
                    state.chain = Some((test, ChainOp::Or));
                    continue;
                }
                _ => {}
            }

            // A ResetNextIf scheduled by the previous condition zeroes this
            // condition's hits and suppresses its increment this frame.
            let reset_this = state.reset_next;
            state.reset_next = false;
            if reset_this {
                cond.current_hits = 0;
            }
            let suspended = reset_this || (state.paused && cond.cond_type.is_pausable());

            if matches!(
                cond.cond_type,
                ConditionType::AddHits | ConditionType::SubHits
            ) {
                if test && !suspended {
                    cond.current_hits += 1;
                }
                cond.is_true = test;
                if cond.cond_type == ConditionType::AddHits {
                    state.add_hits += cond.current_hits as i64;
                } else {
                    state.add_hits -= cond.current_hits as i64;
                }
                continue;
            }

            let total_hits;
            if cond.required_hits == 0 {
                cond.is_true = test;
                total_hits = cond.current_hits as i64 + state.add_hits;
            } else {
                if test && !suspended {
                    cond.current_hits += 1;
                }
                total_hits = cond.current_hits as i64 + state.add_hits;
                cond.is_true = total_hits >= cond.required_hits as i64;
            }
            state.add_hits = 0;

            match cond.cond_type {
                ConditionType::PauseIf => {
                    if cond.is_true {
                        state.paused = true;
                    }
                }
                ConditionType::ResetIf => {
                    if cond.is_true {
                        reset = true;
                    }
                }
                ConditionType::ResetNextIf => {
                    if cond.is_true {
                        state.reset_next = true;
                    }
                }
                ConditionType::MeasuredIf => {
                    if !cond.is_true {
                        state.measured_allowed = false;
                    }
                }
                ConditionType::Measured => {
                    let progress = if cond.required_hits > 0 {
                        total_hits.clamp(0, u32::MAX as i64) as u32
                    } else {
                        numeric
                    };
                    if state.measured_allowed {
                        measured_update = Some(progress);
                    }
                    measured_target = cond.measured_target();
                    measured_as_percent |= cond.measured_as_percent;
                    if cond.operator.is_comparison() {
                        value &= cond.is_true;
                        primed &= cond.is_true;
                    }
                }
                ConditionType::Trigger => {
                    has_trigger = true;
                    value &= cond.is_true;
                }
                _ => {
                    value &= cond.is_true;
                    primed &= cond.is_true;
                }
            }
        }

        if let Some(m) = measured_update {
            self.measured = m;
        }

        GroupResult {
            value: value && !state.paused && !reset,
            paused: state.paused,
            reset,
            measured: self.measured,
            measured_target,
            measured_as_percent,
            has_trigger,
            primed: primed && !state.paused && !reset,
        }
    }
}

/// Outcome of evaluating a trigger for one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerResult {
    /// Whether the trigger fired this frame: core satisfied and, when
    /// alternate groups exist, at least one of them satisfied
    pub fired: bool,
    /// Whether everything but the Trigger-type conditions is satisfied,
    /// i.e. the trigger is armed
    pub primed: bool,
    /// Whether any group was paused this frame
    pub paused: bool,
    /// Largest measured value reported by any group
    pub measured: u32,
    /// Target for the measured value
    pub measured_target: u32,
    /// Whether the measured value is presented as a percentage
    pub measured_as_percent: bool,
}

impl Trigger {
    /// Advance the trigger by one frame.
    ///
    /// Refreshes the entire shared memory-reference chain first so every
    /// group observes one consistent snapshot, then evaluates the core and
    /// alternate groups in order. A ResetIf firing in any group zeroes hit
    /// counts across all groups and forces the frame's result false.
    pub fn evaluate(&mut self, peek: Option<&dyn MemoryPeek>) -> TriggerResult {
        self.pool.refresh_all(peek);

        let core = self.core.evaluate(&mut self.pool, peek);
        let mut reset = core.reset;
        let mut paused = core.paused;
        let mut any_trigger = core.has_trigger;
        let mut alt_fired = self.alts.is_empty();
        let mut alt_primed = self.alts.is_empty();
        let mut measured = core.measured;
        let mut measured_target = core.measured_target;
        let mut measured_as_percent = core.measured_as_percent;

        for alt in &mut self.alts {
            let r = alt.evaluate(&mut self.pool, peek);
            reset |= r.reset;
            paused |= r.paused;
            any_trigger |= r.has_trigger;
            alt_fired |= r.value;
            alt_primed |= r.primed;
            if r.measured > measured {
                measured = r.measured;
            }
            if measured_target == 0 {
                measured_target = r.measured_target;
            }
            measured_as_percent |= r.measured_as_percent;
        }

        if reset {
            self.reset_hits();
        }

        let fired = !reset && core.value && alt_fired;
        let primed = !reset && !fired && any_trigger && core.primed && alt_primed;

        TriggerResult {
            fired,
            primed,
            paused,
            measured,
            measured_target,
            measured_as_percent,
        }
    }

    /// Zero every condition's hit count in every group
    pub fn reset_hits(&mut self) {
        self.core.reset_hits();
        for alt in &mut self.alts {
            alt.reset_hits();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::SliceMemory;

    fn frame(trigger: &mut Trigger, mem: &SliceMemory) -> TriggerResult {
        trigger.evaluate(Some(mem))
    }

    #[test]
    fn test_instantaneous_condition() {
        let mut trigger = Trigger::parse("0xH0000=10").unwrap();
        let mut mem = SliceMemory::new(vec![0]);
        assert!(!frame(&mut trigger, &mem).fired);
        mem.poke(0, 10);
        assert!(frame(&mut trigger, &mem).fired);
        mem.poke(0, 9);
        assert!(!frame(&mut trigger, &mem).fired);
    }

    #[test]
    fn test_required_hits_counts_true_frames_only() {
        // true on frames 1, 2, 4, 5: exactly three true evaluations are
        // needed, the false frame in between does not lose progress, and
        // the state never decays afterwards
        let mut trigger = Trigger::parse("0xH0000=1(3)").unwrap();
        let mut mem = SliceMemory::new(vec![1]);

        assert!(!frame(&mut trigger, &mem).fired); // frame 1: hits == 1
        assert!(!frame(&mut trigger, &mem).fired); // frame 2: hits == 2
        mem.poke(0, 0);
        assert!(!frame(&mut trigger, &mem).fired); // frame 3 (false): hits == 2
        mem.poke(0, 1);
        assert!(frame(&mut trigger, &mem).fired); // frame 4: third true evaluation
        assert!(frame(&mut trigger, &mem).fired); // frame 5: still true
        mem.poke(0, 0);
        assert!(frame(&mut trigger, &mem).fired); // latched
        assert!(trigger.core.conditions[0].is_true);
    }

    #[test]
    fn test_reset_if_zeroes_all_hit_counters() {
        let mut trigger = Trigger::parse("0xH0000=1(2)_0xH0001=1(2)_R:0xH0002=1").unwrap();
        let mut mem = SliceMemory::new(vec![1, 1, 0]);

        assert!(!frame(&mut trigger, &mem).fired);
        assert_eq!(trigger.core.conditions[0].current_hits, 1);
        assert_eq!(trigger.core.conditions[1].current_hits, 1);

        mem.poke(2, 1);
        let r = frame(&mut trigger, &mem);
        assert!(!r.fired);
        assert_eq!(trigger.core.conditions[0].current_hits, 0);
        assert_eq!(trigger.core.conditions[1].current_hits, 0);

        // with the reset released, counting starts over
        mem.poke(2, 0);
        assert!(!frame(&mut trigger, &mem).fired);
        assert_eq!(trigger.core.conditions[0].current_hits, 1);
        assert!(frame(&mut trigger, &mem).fired);
    }

    #[test]
    fn test_reset_next_if_only_resets_following_condition() {
        let mut trigger = Trigger::parse("Z:0xH0002=1_0xH0000=1(2)_0xH0001=1(2)").unwrap();
        let mut mem = SliceMemory::new(vec![1, 1, 0]);

        assert!(!frame(&mut trigger, &mem).fired);
        mem.poke(2, 1);
        frame(&mut trigger, &mem);
        assert_eq!(trigger.core.conditions[1].current_hits, 0);
        assert_eq!(trigger.core.conditions[2].current_hits, 2);
    }

    #[test]
    fn test_pause_if_suspends_hit_counting() {
        let mut trigger = Trigger::parse("P:0xH0001=1_0xH0000=1(2)").unwrap();
        let mut mem = SliceMemory::new(vec![1, 1]);

        let r = frame(&mut trigger, &mem);
        assert!(r.paused);
        assert!(!r.fired);
        assert_eq!(trigger.core.conditions[1].current_hits, 0);

        mem.poke(1, 0);
        assert!(!frame(&mut trigger, &mem).paused);
        assert_eq!(trigger.core.conditions[1].current_hits, 1);
        assert!(frame(&mut trigger, &mem).fired);
    }

    #[test]
    fn test_add_source_multiplier() {
        // the next condition sees 2 * mem[0] + mem[1]
        let mut trigger = Trigger::parse("A:0xH0000*2_0xH0001=5").unwrap();
        let mem = SliceMemory::new(vec![2, 1]);
        assert!(frame(&mut trigger, &mem).fired);

        let mem = SliceMemory::new(vec![2, 2]);
        let mut trigger = Trigger::parse("A:0xH0000*2_0xH0001=5").unwrap();
        assert!(!frame(&mut trigger, &mem).fired);
    }

    #[test]
    fn test_sub_source_wraps() {
        // mem[1] - mem[0] compared against a wrapped "negative" constant
        let mut trigger = Trigger::parse("B:0xH0000_0xH0001=4294967295").unwrap();
        let mem = SliceMemory::new(vec![2, 1]);
        assert!(frame(&mut trigger, &mem).fired);
    }

    #[test]
    fn test_multiply_overflow_is_twos_complement() {
        // 3 * -2 == -6 in unsigned arithmetic
        assert_eq!(
            apply_arithmetic(
                3,
                ConditionOperator::Multiply,
                &Operand::Const(0xFFFFFFFE),
                0xFFFFFFFE
            ),
            0xFFFFFFFA
        );
    }

    #[test]
    fn test_divide_by_zero_yields_zero() {
        assert_eq!(
            apply_arithmetic(10, ConditionOperator::Divide, &Operand::Const(0), 0),
            0
        );
        assert_eq!(
            apply_arithmetic(10, ConditionOperator::Divide, &Operand::Float(0.0), 0),
            0
        );
        assert_eq!(
            apply_arithmetic(10, ConditionOperator::Divide, &Operand::Const(3), 3),
            3
        );
    }

    #[test]
    fn test_float_multiplier_truncates_toward_zero() {
        assert_eq!(
            apply_arithmetic(3, ConditionOperator::Multiply, &Operand::Float(1.5), 0),
            4
        );
        assert_eq!(
            apply_arithmetic(3, ConditionOperator::Multiply, &Operand::Float(-1.0), 0),
            0xFFFFFFFD
        );
        assert_eq!(
            apply_arithmetic(7, ConditionOperator::Divide, &Operand::Float(2.0), 0),
            3
        );
    }

    #[test]
    fn test_and_next_chain() {
        let mut trigger = Trigger::parse("N:0xH0000=1_0xH0001=1").unwrap();
        let mem = SliceMemory::new(vec![1, 1]);
        assert!(frame(&mut trigger, &mem).fired);

        let mut trigger = Trigger::parse("N:0xH0000=1_0xH0001=1").unwrap();
        let mem = SliceMemory::new(vec![0, 1]);
        assert!(!frame(&mut trigger, &mem).fired);
    }

    #[test]
    fn test_or_next_chain() {
        let mut trigger = Trigger::parse("O:0xH0000=1_0xH0001=1").unwrap();
        let mem = SliceMemory::new(vec![1, 0]);
        assert!(frame(&mut trigger, &mem).fired);

        let mut trigger = Trigger::parse("O:0xH0000=1_0xH0001=1").unwrap();
        let mem = SliceMemory::new(vec![0, 0]);
        assert!(!frame(&mut trigger, &mem).fired);
    }

    #[test]
    fn test_and_next_feeds_hit_counter_of_final_condition() {
        let mut trigger = Trigger::parse("N:0xH0000=1_0xH0001=1(2)").unwrap();
        let mem = SliceMemory::new(vec![1, 1]);
        assert!(!frame(&mut trigger, &mem).fired);
        assert!(frame(&mut trigger, &mem).fired);
        // the AndNext condition itself never counts hits
        assert_eq!(trigger.core.conditions[0].current_hits, 0);
    }

    #[test]
    fn test_add_hits_accumulates_across_conditions() {
        // either counter reaching a combined 3 fires
        let mut trigger = Trigger::parse("C:0xH0000=1_0xH0001=1(3)").unwrap();
        let mem = SliceMemory::new(vec![1, 1]);
        assert!(!frame(&mut trigger, &mem).fired); // 1 + 1 hits
        let r = frame(&mut trigger, &mem); // 2 + 2 hits
        assert!(r.fired);
    }

    #[test]
    fn test_sub_hits_subtracts() {
        let mut trigger = Trigger::parse("D:0xH0000=1_0xH0001=1(2)").unwrap();
        let mem = SliceMemory::new(vec![1, 1]);
        assert!(!frame(&mut trigger, &mem).fired); // 1 - 1
        assert!(!frame(&mut trigger, &mem).fired); // 2 - 2
        let mem2 = SliceMemory::new(vec![0, 1]);
        assert!(!frame(&mut trigger, &mem2).fired); // 3 - 2
        assert!(frame(&mut trigger, &mem2).fired); // 4 - 2
    }

    #[test]
    fn test_measured_raw_value() {
        let mut trigger = Trigger::parse("M:0xH0000").unwrap();
        let mem = SliceMemory::new(vec![42]);
        let r = frame(&mut trigger, &mem);
        assert_eq!(r.measured, 42);
        assert_eq!(r.measured_target, 0);
    }

    #[test]
    fn test_measured_hit_progress() {
        let mut trigger = Trigger::parse("M:0xH0000=1(4)").unwrap();
        let mem = SliceMemory::new(vec![1]);
        let r = frame(&mut trigger, &mem);
        assert_eq!(r.measured, 1);
        assert_eq!(r.measured_target, 4);
        assert!(!r.fired);
        frame(&mut trigger, &mem);
        frame(&mut trigger, &mem);
        let r = frame(&mut trigger, &mem);
        assert_eq!(r.measured, 4);
        assert!(r.fired);
    }

    #[test]
    fn test_measured_if_freezes_value() {
        let mut trigger = Trigger::parse("Q:0xH0001=1_M:0xH0000").unwrap();
        let mut mem = SliceMemory::new(vec![10, 1]);
        assert_eq!(frame(&mut trigger, &mem).measured, 10);

        // gate closes: the reported value stays at its previous state
        mem.poke(1, 0);
        mem.poke(0, 77);
        assert_eq!(frame(&mut trigger, &mem).measured, 10);

        mem.poke(1, 1);
        assert_eq!(frame(&mut trigger, &mem).measured, 77);
    }

    #[test]
    fn test_measured_as_percent_flag() {
        let mut trigger = Trigger::parse("G:0xH0000").unwrap();
        let mem = SliceMemory::new(vec![5]);
        assert!(frame(&mut trigger, &mem).measured_as_percent);
    }

    #[test]
    fn test_trigger_condition_primes() {
        let mut trigger = Trigger::parse("0xH0000=1_T:0xH0001=1").unwrap();
        let mut mem = SliceMemory::new(vec![0, 0]);

        let r = frame(&mut trigger, &mem);
        assert!(!r.fired);
        assert!(!r.primed);

        // non-trigger conditions satisfied: armed
        mem.poke(0, 1);
        let r = frame(&mut trigger, &mem);
        assert!(!r.fired);
        assert!(r.primed);

        mem.poke(1, 1);
        let r = frame(&mut trigger, &mem);
        assert!(r.fired);
        assert!(!r.primed);
    }

    #[test]
    fn test_alt_groups() {
        let mut trigger = Trigger::parse("0xH0000=1S0xH0001=1S0xH0002=1").unwrap();
        let mut mem = SliceMemory::new(vec![1, 0, 0]);
        // core true but no alt satisfied
        assert!(!frame(&mut trigger, &mem).fired);
        mem.poke(2, 1);
        assert!(frame(&mut trigger, &mem).fired);
        // alt without core does not fire
        mem.poke(0, 0);
        assert!(!frame(&mut trigger, &mem).fired);
    }

    #[test]
    fn test_reset_in_alt_resets_core_hits() {
        let mut trigger = Trigger::parse("0xH0000=1(5)SR:0xH0001=1").unwrap();
        let mut mem = SliceMemory::new(vec![1, 0]);
        frame(&mut trigger, &mem);
        frame(&mut trigger, &mem);
        assert_eq!(trigger.core.conditions[0].current_hits, 2);

        mem.poke(1, 1);
        frame(&mut trigger, &mem);
        assert_eq!(trigger.core.conditions[0].current_hits, 0);
    }

    #[test]
    fn test_add_address_indirection() {
        // mem[0x00] holds an offset; the test reads mem[0x10 + offset]
        let mut trigger = Trigger::parse("I:0xH0000_0xH0010=7").unwrap();
        let mut mem = SliceMemory::new(vec![0u8; 32]);
        mem.poke(0x00, 4);
        mem.poke(0x14, 7);
        assert!(frame(&mut trigger, &mem).fired);

        // pointer moves between frames
        mem.poke(0x00, 8);
        assert!(!frame(&mut trigger, &mem).fired);
        mem.poke(0x18, 7);
        assert!(frame(&mut trigger, &mem).fired);
    }

    #[test]
    fn test_add_address_offset_does_not_leak() {
        // the condition after the indirect one reads the plain address
        let mut trigger = Trigger::parse("I:0xH0000_0xH0010=7_0xH0010=3").unwrap();
        let mut mem = SliceMemory::new(vec![0u8; 32]);
        mem.poke(0x00, 4);
        mem.poke(0x14, 7);
        mem.poke(0x10, 3);
        assert!(frame(&mut trigger, &mem).fired);
    }

    #[test]
    fn test_no_peek_reads_zero() {
        let mut trigger = Trigger::parse("0xH0000=0").unwrap();
        assert!(trigger.evaluate(None).fired);
    }
}
