//! Common types used throughout the code generator
//! 
//! This module defines the enumerations that arrive from the kernel
//! orchestrator as plain tags, such as the data precision of a tile.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Data precision of the elements moved through local memory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    /// 32-bit IEEE float
    #[default]
    Fp32,
    /// 16-bit IEEE half
    Fp16,
    /// 16-bit brain float
    Bf16,
}

impl Precision {
    /// Size of one element in bytes
    pub fn data_byte(&self) -> u32 {
        match self {
            Precision::Fp32 => 4,
            Precision::Fp16 | Precision::Bf16 => 2,
        }
    }

    /// Bit-width tag used when naming templates
    pub fn bits_tag(&self) -> &'static str {
        match self {
            Precision::Fp32 => "b32",
            Precision::Fp16 => "b16",
            Precision::Bf16 => "bf16",
        }
    }

    /// Whether store templates of this precision can be rendered
    pub fn is_renderable(&self) -> bool {
        matches!(self, Precision::Fp32)
    }
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Precision::Fp32 => write!(f, "fp32"),
            Precision::Fp16 => write!(f, "fp16"),
            Precision::Bf16 => write!(f, "bf16"),
        }
    }
}

impl std::str::FromStr for Precision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fp32" => Ok(Precision::Fp32),
            "fp16" => Ok(Precision::Fp16),
            "bf16" => Ok(Precision::Bf16),
            other => Err(format!("unknown precision '{}'", other)),
        }
    }
}

/// Order in which a 2D store walks its source registers
/// 
/// Serialized as the integer tag the tiling parameters carry (`0` or `1`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(try_from = "u8", into = "u8")]
pub enum SourceOrder {
    /// d0 outer, d1 inner
    #[default]
    D0D1,
    /// d1 outer, d0 inner
    D1D0,
}

impl SourceOrder {
    pub fn tag(&self) -> u8 {
        match self {
            SourceOrder::D0D1 => 0,
            SourceOrder::D1D0 => 1,
        }
    }
}

impl TryFrom<u8> for SourceOrder {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(SourceOrder::D0D1),
            1 => Ok(SourceOrder::D1D0),
            other => Err(format!("unknown source order {}", other)),
        }
    }
}

impl From<SourceOrder> for u8 {
    fn from(order: SourceOrder) -> u8 {
        order.tag()
    }
}

impl fmt::Display for SourceOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}
