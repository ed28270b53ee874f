//! Primitive local data share instructions
//! 
//! Single `ds_read_b*` / `ds_write_b*` instructions for one fixed access
//! width. These are the building blocks of the paired-access selector's
//! fallback tier and of the 2D store templates.

use crate::asm::Offset;
use igc_common::CodegenError;
use log::trace;

/// Access width of one primitive LDS instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LdsWidth {
    B32,
    B64,
    B96,
    B128,
}

impl LdsWidth {
    pub fn from_bytes(bytes: u32) -> Result<Self, CodegenError> {
        match bytes {
            4 => Ok(LdsWidth::B32),
            8 => Ok(LdsWidth::B64),
            12 => Ok(LdsWidth::B96),
            16 => Ok(LdsWidth::B128),
            other => Err(CodegenError::UnsupportedWidth(other)),
        }
    }

    /// Number of 32-bit registers the data operand spans
    pub fn units(&self) -> u32 {
        match self {
            LdsWidth::B32 => 1,
            LdsWidth::B64 => 2,
            LdsWidth::B96 => 3,
            LdsWidth::B128 => 4,
        }
    }

    fn mnemonic_suffix(&self) -> &'static str {
        match self {
            LdsWidth::B32 => "b32",
            LdsWidth::B64 => "b64",
            LdsWidth::B96 => "b96",
            LdsWidth::B128 => "b128",
        }
    }

    /// Register operand text for data starting at `reg`
    fn data_operand(&self, reg: &str) -> String {
        match self.units() {
            1 => format!("v[{}]", reg),
            n => format!("v[{}:{}+{}]", reg, reg, n - 1),
        }
    }
}

fn with_offset(inst: String, offset: &Offset) -> String {
    match offset.suffix() {
        Some(suffix) => format!("{} {}", inst, suffix),
        None => inst,
    }
}

/// `ds_read_b{32,64,96,128}`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DsRead {
    width: LdsWidth,
}

impl DsRead {
    pub fn new(bytes: u32) -> Result<Self, CodegenError> {
        Ok(Self { width: LdsWidth::from_bytes(bytes)? })
    }

    /// Render one load of `vdst` from the address in `vaddr`
    pub fn render(&self, vdst: &str, vaddr: &str, offset: &Offset) -> String {
        let inst = format!(
            "ds_read_{} {}, v[{}]",
            self.width.mnemonic_suffix(),
            self.width.data_operand(vdst),
            vaddr
        );
        let inst = with_offset(inst, offset);
        trace!("ds_read: {}", inst);
        inst
    }

    pub fn issues(&self) -> u32 {
        1
    }
}

/// `ds_write_b{32,64,96,128}`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DsWrite {
    width: LdsWidth,
}

impl DsWrite {
    pub fn new(bytes: u32) -> Result<Self, CodegenError> {
        Ok(Self { width: LdsWidth::from_bytes(bytes)? })
    }

    /// Render one store of `vdata` to the address in `vaddr`
    pub fn render(&self, vaddr: &str, vdata: &str, offset: &Offset) -> String {
        let inst = format!(
            "ds_write_{} v[{}], {}",
            self.width.mnemonic_suffix(),
            vaddr,
            self.width.data_operand(vdata)
        );
        let inst = with_offset(inst, offset);
        trace!("ds_write: {}", inst);
        inst
    }

    pub fn issues(&self) -> u32 {
        1
    }
}
