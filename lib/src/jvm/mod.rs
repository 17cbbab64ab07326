//! Model of JVM classes, as consumed by the analysis
//!
//! ### Simple example
//!
//! Consider the following simple Java method:
//!
//! ```java,ignore,no_run
//! static int twice(int x) {
//!     int y = x + x;
//!     return y;
//! }
//! ```
//!
//! Once parsed out of a class file, it could be represented as follows:
//!
//! ```
//! use lvtgen::jvm::code::{Code, Instruction, Label};
//! use lvtgen::jvm::model::Method;
//! use lvtgen::jvm::*;
//!
//! let code = Code::new(
//!     2,
//!     2,
//!     vec![
//!         Instruction::Label(Label(0)),
//!         Instruction::ILoad(0),
//!         Instruction::ILoad(0),
//!         Instruction::IAdd,
//!         Instruction::IStore(1),
//!         Instruction::ILoad(1),
//!         Instruction::IReturn,
//!         Instruction::Label(Label(1)),
//!     ],
//! );
//! let method = Method::new(
//!     UnqualifiedName::from_string(String::from("twice")).unwrap(),
//!     MethodDescriptor::parse("(I)I").unwrap(),
//!     MethodAccessFlags::STATIC,
//!     Some(code),
//! );
//! assert!(method.is_static());
//! ```

mod access_flags;
pub mod class_graph;
pub mod code;
mod descriptors;
mod errors;
pub mod model;
mod names;

pub use access_flags::*;
pub use descriptors::*;
pub use errors::*;
pub use names::*;
