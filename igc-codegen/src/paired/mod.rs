//! Paired LDS access selection
//! 
//! A batch of equally spaced local memory accesses can often be issued with
//! half as many instructions by using the two-address encodings
//! (`ds_read2*` / `ds_write2*`). Those encodings carry two 8-bit offset
//! fields counted in element units, or in units of 64 elements for the
//! `st64` forms, so they are only legal for some batches. Selection tries,
//! in order:
//! 
//! 1. unit-paired (`ds_read2_b32`, `ds_write2_b64`, ...)
//! 2. scaled-paired (`ds_read2st64_b32`, ...)
//! 3. one primitive instruction per element
//! 
//! The same eligibility checks drive both the emitted text and
//! [`AccessBatch::issues`], so the cost can be queried without emitting.

use crate::asm::{Offset, Sym};
use crate::emit::{AsmMacro, Emitter};
use crate::lds::{DsRead, DsWrite};
use igc_common::CodegenError;
use log::{debug, trace};


/// Largest value an 8-bit paired offset field can hold, plus one
const PAIRED_OFFSET_LIMIT: u64 = 256;

/// Element scale of the `st64` encodings
const ST64_SCALE: u32 = 64;

/// A batch of `count` equally spaced LDS accesses of `elem_bytes` each
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessBatch {
    pub count: u32,
    pub elem_bytes: u32,
    /// Bytes between the starts of successive elements
    pub stride: u32,
    /// Byte offset of the first element
    pub base_offset: u32,
}

/// Instruction encoding chosen for a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairedTier {
    /// Two elements per instruction, offsets in element units
    Unit,
    /// Two elements per instruction, offsets in 64-element units
    Scaled,
    /// One primitive instruction per element
    Fallback,
}

impl AccessBatch {
    pub fn new(count: u32, elem_bytes: u32, stride: u32) -> Self {
        Self {
            count,
            elem_bytes,
            stride,
            base_offset: 0,
        }
    }

    pub fn with_base(mut self, base_offset: u32) -> Self {
        self.base_offset = base_offset;
        self
    }

    fn pairable(&self) -> bool {
        self.count % 2 == 0 && matches!(self.elem_bytes, 4 | 8)
    }

    /// Whether the last element's offset, counted in `unit` bytes, fits the offset field
    fn fits_offset_field(&self, unit: u32) -> bool {
        let unit = u64::from(unit);
        let last = u64::from(self.base_offset) / unit
            + (u64::from(self.stride) / unit) * u64::from(self.count.saturating_sub(1));
        last < PAIRED_OFFSET_LIMIT
    }

    pub fn is_unit_paired(&self) -> bool {
        if !self.pairable() {
            return false;
        }
        let unit = self.elem_bytes;
        self.base_offset % unit == 0 && self.stride % unit == 0 && self.fits_offset_field(unit)
    }

    pub fn is_scaled_paired(&self) -> bool {
        if !self.pairable() {
            return false;
        }
        let unit = self.elem_bytes * ST64_SCALE;
        // b32 only asks for an element-aligned stride, b64 asks for a scaled-aligned one
        let stride_aligned = match self.elem_bytes {
            4 => self.stride % self.elem_bytes == 0,
            _ => self.stride % unit == 0,
        };
        self.base_offset % unit == 0 && stride_aligned && self.fits_offset_field(unit)
    }

    pub fn tier(&self) -> PairedTier {
        if self.is_unit_paired() {
            PairedTier::Unit
        } else if self.is_scaled_paired() {
            PairedTier::Scaled
        } else {
            PairedTier::Fallback
        }
    }

    /// Instruction issues the selected encoding costs
    pub fn issues(&self) -> u32 {
        match self.tier() {
            PairedTier::Unit | PairedTier::Scaled => self.count / 2,
            PairedTier::Fallback => self.count,
        }
    }

    /// `(offset0, offset1)` of the `pair`-th paired instruction
    fn pair_offsets(&self, tier: PairedTier, pair: u32) -> (u32, u32) {
        let unit = match tier {
            PairedTier::Scaled => self.elem_bytes * ST64_SCALE,
            _ => self.elem_bytes,
        };
        let base = self.base_offset / unit;
        let step = self.stride / unit;
        (base + 2 * pair * step, base + (2 * pair + 1) * step)
    }

    /// Byte offset of the `n`-th element
    fn element_offset(&self, n: u32) -> Offset {
        Offset::Immediate(i64::from(self.base_offset) + i64::from(n) * i64::from(self.stride))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Read,
    Write,
}

impl Direction {
    fn mnemonic(&self, tier: PairedTier, elem_bytes: u32) -> String {
        let op = match self {
            Direction::Read => "ds_read2",
            Direction::Write => "ds_write2",
        };
        let st = if tier == PairedTier::Scaled { "st64" } else { "" };
        format!("{}{}_b{}", op, st, elem_bytes * 8)
    }
}

/// Emit the instructions for `batch` into the current buffer of `e`
/// 
/// `data` is the destination of a read or the source of a write; `addr`
/// holds the LDS byte address.
fn emit_batch(
    e: &mut Emitter,
    batch: &AccessBatch,
    direction: Direction,
    data: &Sym,
    addr: &Sym,
) -> Result<(), CodegenError> {
    let tier = batch.tier();
    debug!("{:?} batch {:?}: selected {:?}", direction, batch, tier);

    if tier == PairedTier::Fallback {
        // data registers advance by the element size in dwords
        let units = batch.elem_bytes / 4;
        match direction {
            Direction::Read => {
                let sld = DsRead::new(batch.elem_bytes)?;
                for n in 0..batch.count {
                    e.emit(sld.render(&data.slot(n * units), &addr.base(), &batch.element_offset(n)));
                }
            }
            Direction::Write => {
                let sst = DsWrite::new(batch.elem_bytes)?;
                for n in 0..batch.count {
                    e.emit(sst.render(&addr.base(), &data.slot(n * units), &batch.element_offset(n)));
                }
            }
        }
        return Ok(());
    }

    let mnemonic = direction.mnemonic(tier, batch.elem_bytes);
    for pair in 0..batch.count / 2 {
        let (offset0, offset1) = batch.pair_offsets(tier, pair);
        let operands = match (direction, batch.elem_bytes) {
            (Direction::Read, 4) => format!("v[{}], v[{}]", data.range(2 * pair, 2 * pair + 1), addr),
            (Direction::Read, _) => format!("v[{}], v[{}]", data.range(4 * pair, 4 * pair + 3), addr),
            (Direction::Write, 4) => format!(
                "v[{}], v[{}], v[{}]",
                addr,
                data.slot(2 * pair),
                data.slot(2 * pair + 1)
            ),
            (Direction::Write, _) => format!(
                "v[{}], v[{}], v[{}]",
                addr,
                data.range(4 * pair, 4 * pair + 1),
                data.range(4 * pair + 2, 4 * pair + 3)
            ),
        };
        let inst = format!("{} {}, offset0:{}, offset1:{}", mnemonic, operands, offset0, offset1);
        trace!("  {}", inst);
        e.emit(inst);
    }
    Ok(())
}

/// Batched LDS load, paired where the encoding allows it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairedRead {
    batch: AccessBatch,
}

impl PairedRead {
    pub fn new(batch: AccessBatch) -> Self {
        Self { batch }
    }

    /// Select an encoding and return the load sequence into `v_dst` from the address in `v_sld`
    pub fn select(&self, e: &mut Emitter, v_dst: &Sym, v_sld: &Sym) -> Result<Vec<String>, CodegenError> {
        e.capture(|e| emit_batch(e, &self.batch, Direction::Read, v_dst, v_sld))
    }
}

impl AsmMacro for PairedRead {
    fn name(&self) -> String {
        String::new()
    }

    fn emit(&self, _emitter: &mut Emitter) -> Result<(), CodegenError> {
        Err(CodegenError::misuse("PairedRead is inlined, call select() instead of emit()"))
    }

    fn issues(&self) -> u32 {
        self.batch.issues()
    }
}

/// Batched LDS store, paired where the encoding allows it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairedWrite {
    batch: AccessBatch,
}

impl PairedWrite {
    pub fn new(batch: AccessBatch) -> Self {
        Self { batch }
    }

    /// Select an encoding and return the store sequence of `v_src` to the address in `v_sst`
    pub fn select(&self, e: &mut Emitter, v_sst: &Sym, v_src: &Sym) -> Result<Vec<String>, CodegenError> {
        e.capture(|e| emit_batch(e, &self.batch, Direction::Write, v_src, v_sst))
    }
}

impl AsmMacro for PairedWrite {
    fn name(&self) -> String {
        String::new()
    }

    fn emit(&self, _emitter: &mut Emitter) -> Result<(), CodegenError> {
        Err(CodegenError::misuse("PairedWrite is inlined, call select() instead of emit()"))
    }

    fn issues(&self) -> u32 {
        self.batch.issues()
    }
}
