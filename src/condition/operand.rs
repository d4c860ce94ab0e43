//! Operands: typed value sources for a condition
//!
//! An operand is either a view over a memory reference (current, delta, or
//! prior value), an integer constant, or a floating-point constant. Memory
//! operands are parsed out of the `0x` syntax and allocated through the
//! shared [`MemrefPool`].

use crate::condition::parser::Cursor;
use crate::error::{ParseError, ParseErrorKind, ParseResult};
use crate::memory::{MemSize, MemoryPeek, MemrefHandle, MemrefPool};

/// A typed source of a numeric value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Operand {
    /// The reference's current value
    Memory(MemrefHandle),
    /// The reference's value as of the last change: `prior` when the last
    /// update observed a change, else the current value
    Delta(MemrefHandle),
    /// The reference's raw prior value
    Prior(MemrefHandle),
    /// An embedded integer literal
    Const(u32),
    /// An embedded floating-point literal; participates in the
    /// condition-level multiply/divide semantics
    Float(f64),
}

impl Operand {
    /// Whether this operand is a floating-point constant
    pub fn is_float(&self) -> bool {
        matches!(self, Operand::Float(_))
    }

    /// The memory reference backing this operand, if any
    pub fn memref(&self) -> Option<MemrefHandle> {
        match self {
            Operand::Memory(h) | Operand::Delta(h) | Operand::Prior(h) => Some(*h),
            _ => None,
        }
    }

    /// Parse one operand from the cursor.
    ///
    /// `is_indirect` marks operands belonging to a condition that follows
    /// an AddAddress: their memory references get fresh, never-shared pool
    /// entries.
    pub fn parse(
        cursor: &mut Cursor<'_>,
        is_indirect: bool,
        pool: &mut MemrefPool,
    ) -> ParseResult<Self> {
        let start = cursor.pos();

        // d0x / p0x select the delta and prior views of a memory read
        match cursor.peek().map(|c| c.to_ascii_lowercase()) {
            Some('d') if cursor.looking_at_ignore_case(1, "0x") => {
                cursor.bump(3);
                let handle = parse_memref(cursor, is_indirect, pool, start)?;
                return Ok(Operand::Delta(handle));
            }
            Some('p') if cursor.looking_at_ignore_case(1, "0x") => {
                cursor.bump(3);
                let handle = parse_memref(cursor, is_indirect, pool, start)?;
                return Ok(Operand::Prior(handle));
            }
            Some('0') if cursor.looking_at_ignore_case(1, "x") => {
                cursor.bump(2);
                let handle = parse_memref(cursor, is_indirect, pool, start)?;
                return Ok(Operand::Memory(handle));
            }
            Some('f') => {
                if let Some(operand) = parse_float(cursor)? {
                    return Ok(operand);
                }
            }
            Some('h') => {
                if cursor.peek_at(1).is_some_and(|c| c.is_ascii_hexdigit()) {
                    cursor.bump(1);
                    let value = parse_hex(cursor, start)?;
                    return Ok(Operand::Const(value));
                }
            }
            Some(c) if c.is_ascii_digit() => {
                let value = parse_decimal(cursor, start)?;
                return Ok(Operand::Const(value));
            }
            _ => {}
        }

        Err(ParseError::new(ParseErrorKind::InvalidMemoryOperand, start))
    }

    /// Resolve this operand to an unsigned 32-bit value.
    ///
    /// Indirect memory references are refreshed first at
    /// `address + add_address`; shared references were already refreshed by
    /// the per-frame bulk pass. Floating constants truncate toward zero;
    /// their fractional semantics live in the condition-level arithmetic.
    pub fn evaluate(
        &self,
        pool: &mut MemrefPool,
        add_address: u32,
        peek: Option<&dyn MemoryPeek>,
    ) -> u32 {
        match *self {
            Operand::Const(value) => value,
            Operand::Float(value) => value as i64 as u32,
            Operand::Memory(h) | Operand::Delta(h) | Operand::Prior(h) => {
                if pool.get(h).is_indirect {
                    pool.refresh_indirect(h, add_address, peek);
                }
                let entry = pool.get(h);
                match self {
                    Operand::Memory(_) => entry.value,
                    Operand::Prior(_) => entry.prior,
                    // Delta: value as of the last change
                    _ => {
                        if entry.changed {
                            entry.prior
                        } else {
                            entry.value
                        }
                    }
                }
            }
        }
    }
}

/// Parse the size letter and hexadecimal address after `0x`
fn parse_memref(
    cursor: &mut Cursor<'_>,
    is_indirect: bool,
    pool: &mut MemrefPool,
    start: usize,
) -> ParseResult<MemrefHandle> {
    // An explicit space is the spelled-out form of the default 16-bit size
    let size = match cursor.peek() {
        Some(' ') => {
            cursor.bump(1);
            MemSize::SixteenBits
        }
        Some(c) => match MemSize::from_letter(c) {
            Some(size) => {
                cursor.bump(1);
                size
            }
            None => MemSize::SixteenBits,
        },
        None => MemSize::SixteenBits,
    };
    let address = parse_hex(cursor, start)?;
    Ok(pool.acquire(address, size, is_indirect))
}

/// Parse hexadecimal digits, saturating at 0xFFFFFFFF
fn parse_hex(cursor: &mut Cursor<'_>, start: usize) -> ParseResult<u32> {
    let mut value = 0u64;
    let mut digits = 0usize;
    while let Some(c) = cursor.peek() {
        let Some(digit) = c.to_digit(16) else { break };
        cursor.bump(1);
        value = (value << 4 | digit as u64).min(u32::MAX as u64);
        digits += 1;
    }
    if digits == 0 {
        return Err(ParseError::new(ParseErrorKind::InvalidMemoryOperand, start));
    }
    Ok(value as u32)
}

/// Parse decimal digits, saturating at 0xFFFFFFFF
fn parse_decimal(cursor: &mut Cursor<'_>, start: usize) -> ParseResult<u32> {
    let mut value = 0u64;
    let mut digits = 0usize;
    while let Some(c) = cursor.peek() {
        let Some(digit) = c.to_digit(10) else { break };
        cursor.bump(1);
        value = (value * 10 + digit as u64).min(u32::MAX as u64);
        digits += 1;
    }
    if digits == 0 {
        return Err(ParseError::new(ParseErrorKind::InvalidMemoryOperand, start));
    }
    Ok(value as u32)
}

/// Parse an `f`-prefixed floating constant: `f[-]digits[.digits]`.
///
/// Returns `Ok(None)` when the `f` is not followed by a number, so the
/// caller can fall through to the invalid-operand error. A non-negative
/// value with no fractional part collapses to an integer constant.
fn parse_float(cursor: &mut Cursor<'_>) -> ParseResult<Option<Operand>> {
    let mut offset = 1usize;
    let negative = cursor.peek_at(offset) == Some('-');
    if negative {
        offset += 1;
    }
    if !cursor.peek_at(offset).is_some_and(|c| c.is_ascii_digit()) {
        return Ok(None);
    }
    cursor.bump(offset);

    let mut value = 0f64;
    while let Some(digit) = cursor.peek().and_then(|c| c.to_digit(10)) {
        cursor.bump(1);
        value = value * 10.0 + digit as f64;
    }
    let mut has_fraction = false;
    if cursor.peek() == Some('.') && cursor.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
        cursor.bump(1);
        let mut scale = 0.1f64;
        while let Some(digit) = cursor.peek().and_then(|c| c.to_digit(10)) {
            cursor.bump(1);
            value += digit as f64 * scale;
            scale *= 0.1;
        }
        has_fraction = value.fract() != 0.0;
    }
    if negative {
        value = -value;
    }

    if !negative && !has_fraction && value <= u32::MAX as f64 {
        Ok(Some(Operand::Const(value as u32)))
    } else {
        Ok(Some(Operand::Float(value)))
    }
}
