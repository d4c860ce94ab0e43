//! Condition type definitions

use crate::condition::operand::Operand;
use crate::memory::MemrefPool;

/// What role a condition plays inside its group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionType {
    /// Plain test; must be true for the group to be true
    Standard,
    /// While true, hit counting is suspended for later conditions
    PauseIf,
    /// While true, every condition in the trigger loses its hits
    ResetIf,
    /// While true, the next condition loses its hits
    ResetNextIf,
    /// Adds its value into the accumulator consumed by the next condition
    AddSource,
    /// Subtracts its value from that accumulator
    SubSource,
    /// Adds its value to the address offset of the next condition's
    /// indirect references
    AddAddress,
    /// Adds its own hit count into the next condition's hit test
    AddHits,
    /// Subtracts its own hit count from the next condition's hit test
    SubHits,
    /// Boolean AND folded into the next condition's test
    AndNext,
    /// Boolean OR folded into the next condition's test
    OrNext,
    /// Reports a progress value instead of only a boolean
    Measured,
    /// Gates whether a following Measured updates this frame
    MeasuredIf,
    /// Like Standard, but also arms the trigger once the rest is satisfied
    Trigger,
}

impl ConditionType {
    /// Map a type-letter (the character before `:`) to a condition type.
    ///
    /// The second tuple element marks the `g` variant of Measured, whose
    /// value is presented as a percentage.
    pub fn from_letter(letter: char) -> Option<(Self, bool)> {
        match letter.to_ascii_lowercase() {
            'p' => Some((ConditionType::PauseIf, false)),
            'r' => Some((ConditionType::ResetIf, false)),
            'z' => Some((ConditionType::ResetNextIf, false)),
            'a' => Some((ConditionType::AddSource, false)),
            'b' => Some((ConditionType::SubSource, false)),
            'i' => Some((ConditionType::AddAddress, false)),
            'c' => Some((ConditionType::AddHits, false)),
            'd' => Some((ConditionType::SubHits, false)),
            'n' => Some((ConditionType::AndNext, false)),
            'o' => Some((ConditionType::OrNext, false)),
            'm' => Some((ConditionType::Measured, false)),
            'g' => Some((ConditionType::Measured, true)),
            'q' => Some((ConditionType::MeasuredIf, false)),
            't' => Some((ConditionType::Trigger, false)),
            _ => None,
        }
    }

    /// Whether this type feeds an accumulator instead of testing truth.
    ///
    /// AddHits/SubHits are not modifying in this sense: they test and count
    /// like Standard conditions and only export their hit count.
    pub fn is_modifying(self) -> bool {
        matches!(
            self,
            ConditionType::AddSource | ConditionType::SubSource | ConditionType::AddAddress
        )
    }

    /// Whether a true PauseIf earlier in the frame suspends this
    /// condition's hit counting
    pub fn is_pausable(self) -> bool {
        !matches!(
            self,
            ConditionType::PauseIf | ConditionType::ResetIf | ConditionType::ResetNextIf
        )
    }
}

/// Comparison and arithmetic operators between the two operands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionOperator {
    Equal,
    NotEqual,
    LessThan,
    LessOrEqual,
    GreaterThan,
    GreaterOrEqual,
    /// No operator: always true as a test, identity as a value
    None,
    Multiply,
    Divide,
    BitwiseAnd,
}

impl ConditionOperator {
    /// Whether this operator compares its operands to a boolean
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            ConditionOperator::Equal
                | ConditionOperator::NotEqual
                | ConditionOperator::LessThan
                | ConditionOperator::LessOrEqual
                | ConditionOperator::GreaterThan
                | ConditionOperator::GreaterOrEqual
        )
    }

    /// Whether this operator combines its operands to a value
    pub fn is_arithmetic(self) -> bool {
        matches!(
            self,
            ConditionOperator::Multiply | ConditionOperator::Divide | ConditionOperator::BitwiseAnd
        )
    }

    /// Apply this operator as an unsigned 32-bit comparison.
    /// `None` (and the arithmetic operators) always yield true.
    pub fn compare(self, a: u32, b: u32) -> bool {
        match self {
            ConditionOperator::Equal => a == b,
            ConditionOperator::NotEqual => a != b,
            ConditionOperator::LessThan => a < b,
            ConditionOperator::LessOrEqual => a <= b,
            ConditionOperator::GreaterThan => a > b,
            ConditionOperator::GreaterOrEqual => a >= b,
            _ => true,
        }
    }
}

/// One parsed condition plus its runtime hit-count state
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub cond_type: ConditionType,
    pub operand1: Operand,
    pub operator: ConditionOperator,
    pub operand2: Operand,
    /// Target hit count; 0 means the test is instantaneous
    pub required_hits: u32,
    /// Frames on which the test has been true since the last reset
    pub current_hits: u32,
    /// Last frame's derived boolean state
    pub is_true: bool,
    /// Set for the `g` Measured variant; carried for the presentation layer
    pub measured_as_percent: bool,
}

impl Condition {
    /// The static target a Measured condition reports progress against
    pub fn measured_target(&self) -> u32 {
        if self.required_hits > 0 {
            self.required_hits
        } else if let Operand::Const(value) = self.operand2 {
            if self.operator.is_comparison() {
                value
            } else {
                0
            }
        } else {
            0
        }
    }
}

/// An ordered, AND-combined sequence of conditions
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionGroup {
    pub conditions: Vec<Condition>,
    /// Last reported measured value; frozen while a MeasuredIf is false
    pub(crate) measured: u32,
}

impl ConditionGroup {
    pub(crate) fn new(conditions: Vec<Condition>) -> Self {
        Self {
            conditions,
            measured: 0,
        }
    }

    /// Zero every condition's hit count
    pub fn reset_hits(&mut self) {
        for condition in &mut self.conditions {
            condition.current_hits = 0;
        }
    }
}

/// A compiled trigger: a core group, optional alternate groups, and the
/// memory-reference pool they share.
///
/// The trigger is the sole long-lived owner of its non-indirect memory
/// references; indirect references live in the same pool but belong to the
/// condition that created them.
#[derive(Debug, Clone)]
pub struct Trigger {
    pub pool: MemrefPool,
    pub core: ConditionGroup,
    pub alts: Vec<ConditionGroup>,
}
