//! Condition language parser
//!
//! Grammar (ASCII, type letters case-insensitive):
//!
//! ```text
//! trigger   := group ('S' group)*
//! group     := condition ('_' condition)*
//! condition := [letter ':'] operand [operator operand] [hits]
//! operator  := '=' | '==' | '!=' | '<' | '<=' | '>' | '>=' | '*' | '/' | '&'
//! hits      := '(' digits ')' | '.' digits '.'
//! ```
//!
//! The terminators `_`, `S`, `)`, `$` and end-of-string directly after the
//! first operand denote a condition with no operator. Any error aborts the
//! whole parse and carries the byte offset of the offending token.

use crate::condition::operand::Operand;
use crate::condition::types::{Condition, ConditionGroup, ConditionOperator, ConditionType, Trigger};
use crate::error::{ParseError, ParseErrorKind, ParseResult};
use crate::memory::MemrefPool;

/// Byte cursor over the condition source text
pub struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    /// Create a cursor at the start of the source
    pub fn new(source: &'a str) -> Self {
        Self {
            bytes: source.as_bytes(),
            pos: 0,
        }
    }

    /// Current byte offset into the source
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Whether the cursor is at end-of-string
    pub fn at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    /// The character at the cursor, if any
    pub fn peek(&self) -> Option<char> {
        self.peek_at(0)
    }

    /// The character `offset` bytes ahead of the cursor, if any
    pub fn peek_at(&self, offset: usize) -> Option<char> {
        self.bytes.get(self.pos + offset).map(|&b| b as char)
    }

    /// Whether the text at `offset` matches `expected`, ASCII
    /// case-insensitively
    pub fn looking_at_ignore_case(&self, offset: usize, expected: &str) -> bool {
        let start = self.pos + offset;
        self.bytes
            .get(start..start + expected.len())
            .is_some_and(|s| s.eq_ignore_ascii_case(expected.as_bytes()))
    }

    /// Advance the cursor by `count` bytes
    pub fn bump(&mut self, count: usize) {
        self.pos = (self.pos + count).min(self.bytes.len());
    }

    /// Consume `expected` if it is the current character
    pub fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }
}

/// Whether `c` legally terminates a condition with no operator
fn is_terminator(c: Option<char>) -> bool {
    matches!(c, None | Some('_') | Some('S') | Some(')') | Some('$'))
}

/// Parse one condition at the cursor.
///
/// `is_indirect` is true when the previous condition in the group was an
/// AddAddress, making this condition's memory operands indirect.
pub fn parse_condition(
    cursor: &mut Cursor<'_>,
    pool: &mut MemrefPool,
    is_indirect: bool,
) -> ParseResult<Condition> {
    // Type prefix: a single letter followed by ':'. A ':' in second
    // position with an unrecognized letter is an error; no ':' means
    // Standard.
    let (cond_type, measured_as_percent) = if cursor.peek_at(1) == Some(':') {
        let letter = cursor.peek().unwrap_or('\0');
        match ConditionType::from_letter(letter) {
            Some((t, pct)) => {
                cursor.bump(2);
                (t, pct)
            }
            None => {
                return Err(ParseError::new(
                    ParseErrorKind::InvalidConditionType,
                    cursor.pos(),
                ))
            }
        }
    } else {
        (ConditionType::Standard, false)
    };

    let operand1_start = cursor.pos();
    let operand1 = Operand::parse(cursor, is_indirect, pool)?;
    if operand1.is_float() && cond_type != ConditionType::Measured {
        let kind = if cond_type.is_modifying() {
            ParseErrorKind::InvalidFpOperand
        } else {
            ParseErrorKind::InvalidComparison
        };
        return Err(ParseError::new(kind, operand1_start));
    }

    let operator_start = cursor.pos();
    let Some(parsed_operator) = parse_operator(cursor)? else {
        // No operator. Legal only for the value-producing types; they get
        // a dummy second operand.
        if cond_type.is_modifying() || cond_type == ConditionType::Measured {
            return Ok(Condition {
                cond_type,
                operand1,
                operator: ConditionOperator::None,
                operand2: Operand::Const(1),
                required_hits: 0,
                current_hits: 0,
                is_true: false,
                measured_as_percent,
            });
        }
        return Err(ParseError::new(
            ParseErrorKind::InvalidOperator,
            operator_start,
        ));
    };

    let operator = if cond_type.is_modifying() {
        if parsed_operator.is_arithmetic() {
            parsed_operator
        } else {
            // Legacy content wrote comparisons on address-modifying
            // conditions; those are coerced to "no operator".
            ConditionOperator::None
        }
    } else if cond_type == ConditionType::Measured {
        parsed_operator
    } else if parsed_operator.is_arithmetic() {
        return Err(ParseError::new(
            ParseErrorKind::InvalidOperator,
            operator_start,
        ));
    } else {
        parsed_operator
    };

    let operand2_start = cursor.pos();
    let mut operand2 = Operand::parse(cursor, is_indirect, pool)?;
    if operand2.is_float() && !cond_type.is_modifying() {
        return Err(ParseError::new(
            ParseErrorKind::InvalidComparison,
            operand2_start,
        ));
    }
    if operator == ConditionOperator::None {
        operand2 = Operand::Const(0);
    }

    let hits = parse_required_hits(cursor)?;
    // A hit target is meaningless without a comparison
    let required_hits = if operator == ConditionOperator::None {
        0
    } else {
        hits
    };

    Ok(Condition {
        cond_type,
        operand1,
        operator,
        operand2,
        required_hits,
        current_hits: 0,
        is_true: false,
        measured_as_percent,
    })
}

/// Parse an operator token, or recognize a terminator as "no operator"
fn parse_operator(cursor: &mut Cursor<'_>) -> ParseResult<Option<ConditionOperator>> {
    let start = cursor.pos();
    let op = match cursor.peek() {
        Some('=') => {
            cursor.bump(1);
            cursor.eat('=');
            ConditionOperator::Equal
        }
        Some('!') => {
            cursor.bump(1);
            if !cursor.eat('=') {
                return Err(ParseError::new(ParseErrorKind::InvalidOperator, start));
            }
            ConditionOperator::NotEqual
        }
        Some('<') => {
            cursor.bump(1);
            if cursor.eat('=') {
                ConditionOperator::LessOrEqual
            } else {
                ConditionOperator::LessThan
            }
        }
        Some('>') => {
            cursor.bump(1);
            if cursor.eat('=') {
                ConditionOperator::GreaterOrEqual
            } else {
                ConditionOperator::GreaterThan
            }
        }
        Some('*') => {
            cursor.bump(1);
            ConditionOperator::Multiply
        }
        Some('/') => {
            cursor.bump(1);
            ConditionOperator::Divide
        }
        Some('&') => {
            cursor.bump(1);
            ConditionOperator::BitwiseAnd
        }
        c if is_terminator(c) => return Ok(None),
        _ => return Err(ParseError::new(ParseErrorKind::InvalidOperator, start)),
    };
    Ok(Some(op))
}

/// Parse an optional hit-target suffix: `(digits)` or legacy `.digits.`
fn parse_required_hits(cursor: &mut Cursor<'_>) -> ParseResult<u32> {
    let start = cursor.pos();
    let closer = match cursor.peek() {
        Some('(') => ')',
        Some('.') => '.',
        _ => return Ok(0),
    };
    cursor.bump(1);

    let mut value = 0u64;
    let mut digits = 0usize;
    while let Some(digit) = cursor.peek().and_then(|c| c.to_digit(10)) {
        cursor.bump(1);
        value = value * 10 + digit as u64;
        if value > u32::MAX as u64 {
            return Err(ParseError::new(ParseErrorKind::InvalidRequiredHits, start));
        }
        digits += 1;
    }
    if digits == 0 || !cursor.eat(closer) {
        return Err(ParseError::new(ParseErrorKind::InvalidRequiredHits, start));
    }
    Ok(value as u32)
}

/// Parse a `_`-separated group of conditions, leaving the cursor at the
/// first character that is not part of the group.
pub fn parse_group(cursor: &mut Cursor<'_>, pool: &mut MemrefPool) -> ParseResult<ConditionGroup> {
    let mut conditions = Vec::new();
    let mut is_indirect = false;
    loop {
        let condition = parse_condition(cursor, pool, is_indirect)?;
        is_indirect = condition.cond_type == ConditionType::AddAddress;
        conditions.push(condition);
        if !cursor.eat('_') {
            break;
        }
    }
    Ok(ConditionGroup::new(conditions))
}

impl ConditionGroup {
    /// Parse a single condition group, allocating memory references in
    /// `pool`. The whole input must be consumed.
    pub fn parse(source: &str, pool: &mut MemrefPool) -> ParseResult<Self> {
        let mut cursor = Cursor::new(source);
        let group = parse_group(&mut cursor, pool)?;
        if !cursor.at_end() {
            return Err(ParseError::new(
                ParseErrorKind::InvalidConditionType,
                cursor.pos(),
            ));
        }
        Ok(group)
    }
}

impl Trigger {
    /// Parse a complete trigger: a core group plus zero or more `S`
    /// separated alternate groups, owning its own memory-reference pool.
    pub fn parse(source: &str) -> ParseResult<Self> {
        let mut pool = MemrefPool::new();
        let mut cursor = Cursor::new(source);
        let core = parse_group(&mut cursor, &mut pool)?;
        let mut alts = Vec::new();
        while cursor.eat('S') {
            alts.push(parse_group(&mut cursor, &mut pool)?);
        }
        if !cursor.at_end() {
            return Err(ParseError::new(
                ParseErrorKind::InvalidConditionType,
                cursor.pos(),
            ));
        }
        Ok(Trigger { pool, core, alts })
    }
}
