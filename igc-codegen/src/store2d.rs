//! 2D shared-memory store templates
//! 
//! A `d0 x d1` tile held in consecutive registers is written to LDS as
//! `d0` vector stores of `d1` elements each, the `i`-th one landing
//! `i * stride_d0` bytes after the first. The sequence is emitted once as an
//! assembler macro and then invoked by name; the name encodes every
//! parameter, so equal configurations share one macro and different ones
//! never collide.

use crate::asm::Offset;
use crate::emit::{AsmMacro, Emitter};
use crate::lds::DsWrite;
use igc_common::{CodegenError, Precision, SourceOrder};
use log::debug;
use serde::{Deserialize, Serialize};

/// Parameters of a 2D LDS store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreTemplateConfig {
    /// Number of vector stores; 1 makes this a plain 1D store
    pub length_d0: u32,
    pub length_d1: u32,
    /// Elements per vector store, must equal `length_d1`
    pub vector_d1: u32,
    /// Bytes between successive vector stores
    pub stride_d0: u32,
    pub precision: Precision,
    pub src_order: SourceOrder,
}

impl Default for StoreTemplateConfig {
    fn default() -> Self {
        Self {
            length_d0: 1,
            length_d1: 1,
            vector_d1: 1,
            stride_d0: 0,
            precision: Precision::Fp32,
            src_order: SourceOrder::D0D1,
        }
    }
}

/// A named, reusable 2D store macro
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreTemplate {
    config: StoreTemplateConfig,
}

impl StoreTemplate {
    /// Validate the tile shape. Precision and source order are only checked
    /// when the template is emitted, since unrenderable templates can still
    /// be named.
    pub fn new(config: StoreTemplateConfig) -> Result<Self, CodegenError> {
        if config.length_d1 != config.vector_d1 {
            return Err(CodegenError::WidthMismatch {
                length: config.length_d1,
                vector: config.vector_d1,
            });
        }
        if !matches!(config.vector_d1, 1 | 2 | 4) {
            return Err(CodegenError::UnsupportedWidth(config.vector_d1 * 4));
        }
        Ok(Self { config })
    }

    /// Invocation of this template
    pub fn call(&self, v_src: &str, v_sst_os: &str) -> String {
        format!("{} {}, {}", self.name(), v_src, v_sst_os)
    }
}

impl AsmMacro for StoreTemplate {
    fn name(&self) -> String {
        let c = &self.config;
        let stride = if c.length_d0 == 1 {
            String::new()
        } else {
            format!("_st{}", c.stride_d0)
        };
        format!(
            ".v_sst_so{}_{}x{}_{}_v{}{}",
            c.src_order.tag(),
            c.length_d0,
            c.length_d1,
            c.precision.bits_tag(),
            c.vector_d1,
            stride
        )
    }

    fn emit(&self, emitter: &mut Emitter) -> Result<(), CodegenError> {
        let c = &self.config;
        if !c.precision.is_renderable() {
            return Err(CodegenError::UnsupportedPrecision(c.precision));
        }
        if c.src_order != SourceOrder::D0D1 {
            return Err(CodegenError::Unimplemented(format!(
                "2D store with source order {}",
                c.src_order
            )));
        }

        let name = self.name();
        let bytes = c.vector_d1 * c.precision.data_byte();
        debug!("store template {}: {} stores of {} bytes", name, c.length_d0, bytes);
        let sst = DsWrite::new(bytes)?;
        emitter.emit_macro(&format!("{} v_src, v_sst_os", name), |e| {
            for i in 0..c.length_d0 {
                let src = format!("\\v_src+{}", i * c.vector_d1);
                let offset = Offset::Immediate(i64::from(i) * i64::from(c.stride_d0));
                e.emit(sst.render("\\v_sst_os", &src, &offset));
            }
            Ok(())
        })
    }

    fn issues(&self) -> u32 {
        self.config.length_d0
    }
}
