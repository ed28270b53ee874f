//! iGEMM Codegen - Common Types and Errors
//! 
//! This crate contains the error taxonomy and the small enumerations that
//! are shared by the code generator and its driver.

pub mod error;
pub mod types;

pub use error::CodegenError;
pub use types::{Precision, SourceOrder};
