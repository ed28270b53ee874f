//! Assembly Operand Definitions
//! 
//! This module defines the operand model shared by every emitter: symbolic
//! register handles and instruction offsets.

use std::fmt;

/// Symbolic register handle
/// 
/// Registers are allocated by the kernel orchestrator and arrive here as
/// base labels (`v_dst`, `s_stride`, ...). A handle only renders names; it
/// never owns the registers behind them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Sym {
    label: String,
}

impl Sym {
    pub fn new(label: impl Into<String>) -> Self {
        Self { label: label.into() }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// The bare label, addressing the first unit
    pub fn base(&self) -> String {
        self.label.clone()
    }

    /// A single unit at `index` past the base
    pub fn slot(&self, index: u32) -> String {
        if index == 0 {
            self.label.clone()
        } else {
            format!("{}+{}", self.label, index)
        }
    }

    /// A contiguous range of units, both bounds inclusive
    pub fn range(&self, lo: u32, hi: u32) -> String {
        format!("{}+{}:{}+{}", self.label, lo, self.label, hi)
    }
}

impl fmt::Display for Sym {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label)
    }
}

impl From<&str> for Sym {
    fn from(label: &str) -> Self {
        Sym::new(label)
    }
}

/// Offset field of a local memory instruction
/// 
/// Either a byte count known at generation time, or a symbol the assembler
/// resolves later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Offset {
    Immediate(i64),
    Symbol(String),
}

impl Offset {
    /// The `offset:` suffix, or `None` when the field can be left out
    pub fn suffix(&self) -> Option<String> {
        match self {
            Offset::Immediate(0) => None,
            Offset::Immediate(value) => Some(format!("offset:{}", value)),
            Offset::Symbol(label) => Some(format!("offset:{}", label)),
        }
    }
}

impl Default for Offset {
    fn default() -> Self {
        Offset::Immediate(0)
    }
}

impl From<i64> for Offset {
    fn from(value: i64) -> Self {
        Offset::Immediate(value)
    }
}

impl From<u32> for Offset {
    fn from(value: u32) -> Self {
        Offset::Immediate(i64::from(value))
    }
}

impl From<&str> for Offset {
    fn from(label: &str) -> Self {
        Offset::Symbol(label.to_string())
    }
}
