//! Reconstruct local variable tables for JVM bytecode
//!
//! Obfuscators and minifiers routinely strip the `LocalVariableTable` attribute out of class
//! files. Decompilers and deobfuscation tools then have to invent names and scopes for every local
//! on their own, usually badly. This crate recovers a table for each method by analysing the
//! bytecode directly:
//!
//!   - [`jvm`] models the classes, methods, and instructions being analysed, along with the class
//!     hierarchy used to answer subtyping questions
//!   - [`analysis`] runs the dataflow analysis, refines the inferred types, splits and merges the
//!     resulting live ranges, and names the final entries
//!
//! The entry point for most users is [`analysis::Pipeline`].

pub mod analysis;
pub mod jvm;
mod util;
