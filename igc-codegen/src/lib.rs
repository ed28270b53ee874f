//! iGEMM Codegen - Local Data Share Access Generation
//! 
//! This crate generates the AMDGPU assembly text that moves matrix tiles
//! between registers and local data share (LDS) memory. It includes:
//! 
//! - Symbolic register operands and instruction offsets
//! - An emission sink with nested capture scopes
//! - Primitive `ds_read` / `ds_write` encoders
//! - Paired-access selection (`ds_read2`, `ds_write2`, `st64` forms)
//! - In-register transpose planning with `v_swap_b32`
//! - Reusable 2D store macros

pub mod asm;
pub mod context;
pub mod emit;
pub mod lds;
pub mod paired;
pub mod store2d;
pub mod swap;

pub use asm::{Offset, Sym};
pub use context::{BuildContext, StrideShiftCache};
pub use emit::{AsmMacro, Emitter};
pub use lds::{DsRead, DsWrite, LdsWidth};
pub use paired::{AccessBatch, PairedRead, PairedTier, PairedWrite};
pub use store2d::{StoreTemplate, StoreTemplateConfig};
pub use swap::{RowSwap, SwapPlan, TransposeStore};

pub use igc_common::{CodegenError, Precision, SourceOrder};
