//! Bytecode representation
//!
//! Method [`Code`] is a flat list of [`Instruction`]s. Positions that need to be referred to (jump
//! targets, try-catch ranges, and local variable scopes) are marked with [`Label`]
//! pseudo-instructions. Stack map frames are also kept inline as pseudo-instructions, since their
//! meaning depends on where they are in the instruction list.
//!
//! The representation is deliberately close to a flattened class file `Code` attribute: the
//! analysis needs random access by position as well as the ability to insert new labels when
//! emitting the local variable table.

mod code;
mod instructions;
mod label;
mod stack_map;

pub use code::*;
pub use instructions::*;
pub use label::*;
pub use stack_map::*;
