//! Per-pass build context
//! 
//! State that lives for exactly one generation pass, next to the emission
//! sink: macros already defined and the stride-shift cache. Nothing here is
//! global; a new pass starts from a fresh [`BuildContext`].

use crate::asm::Sym;
use crate::emit::{AsmMacro, Emitter};
use igc_common::CodegenError;
use log::{debug, trace};
use std::collections::HashSet;
use std::convert::Infallible;

/// Scalar registers that have already been shifted in place
/// 
/// Strides arrive in elements and are turned into bytes with a left shift;
/// shifting the same register twice would corrupt it.
#[derive(Debug, Default)]
pub struct StrideShiftCache {
    shifted: HashSet<String>,
}

impl StrideShiftCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_shifted(&self, gpr: &Sym) -> bool {
        self.shifted.contains(gpr.label())
    }

    pub fn len(&self) -> usize {
        self.shifted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shifted.is_empty()
    }

    /// Shift `gpr` left by `shifter` unless it was shifted before
    /// 
    /// Returns the captured lines, empty on a cache hit.
    pub fn try_shift(&mut self, e: &mut Emitter, gpr: &Sym, shifter: u32) -> Vec<String> {
        let first_use = self.shifted.insert(gpr.label().to_string());
        let captured = e.capture(|e| {
            if first_use {
                e.emit(format!("s_lshl_b32 s[{}], s[{}], {}", gpr, gpr, shifter));
            } else {
                trace!("stride {} already shifted", gpr);
            }
            Ok::<(), Infallible>(())
        });
        match captured {
            Ok(lines) => lines,
            Err(never) => match never {},
        }
    }
}

/// Everything one kernel generation pass accumulates
#[derive(Debug, Default)]
pub struct BuildContext {
    emitter: Emitter,
    shift_cache: StrideShiftCache,
    defined: HashSet<String>,
}

impl BuildContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emitter(&self) -> &Emitter {
        &self.emitter
    }

    pub fn emitter_mut(&mut self) -> &mut Emitter {
        &mut self.emitter
    }

    pub fn shift_cache(&self) -> &StrideShiftCache {
        &self.shift_cache
    }

    /// Emit `s_lshl_b32` for `gpr` the first time it is seen in this pass
    pub fn try_shift_stride(&mut self, gpr: &Sym, shifter: u32) -> Vec<String> {
        self.shift_cache.try_shift(&mut self.emitter, gpr, shifter)
    }

    /// Emit the definition of `m` unless one with the same name exists
    /// 
    /// Returns whether a definition was emitted. A failed definition is not
    /// recorded.
    pub fn define(&mut self, m: &dyn AsmMacro) -> Result<bool, CodegenError> {
        let name = m.name();
        if self.defined.contains(&name) {
            trace!("macro {} already defined", name);
            return Ok(false);
        }
        m.emit(&mut self.emitter)?;
        debug!("defined macro {}", name);
        self.defined.insert(name);
        Ok(true)
    }

    /// Emit `lines` into the pass output
    pub fn emit_all(&mut self, lines: Vec<String>) {
        self.emitter.emit_all(lines);
    }

    /// Finished pass output
    pub fn finish(self) -> String {
        self.emitter.render()
    }
}
