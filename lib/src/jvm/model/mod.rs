//! Semantic representations of classes
//!
//! This is the representation the analysis reads and updates. Only the parts that matter for
//! reconstructing local variables are kept around:
//!
//!   - __Class__ is represented using [`Class`]
//!   - __Method__ is represented using [`Method`], whose body is a [`crate::jvm::code::Code`]
//!
//! Reading and writing class files is left to whatever produced these values.

mod class;
mod method;

pub use class::*;
pub use method::*;
