//! The condition layer: parsing the condition language and stepping the
//! per-frame hit-count state machine.

mod evaluator;
mod operand;
mod parser;
mod types;

pub use evaluator::{EvalState, GroupResult, TriggerResult};
pub use operand::Operand;
pub use parser::Cursor;
pub use types::{Condition, ConditionGroup, ConditionOperator, ConditionType, Trigger};
