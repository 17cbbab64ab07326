//! Local variable table reconstruction
//!
//! Every method without a complete table goes through these stages, each one working off the
//! fixed point reached by the previous one:
//!
//!   1. [`ControlFlow`] marks entries, exits, and edges between instructions
//!   2. [`compute_frames`] propagates abstract [`Frame`]s along those edges until they stabilise
//!      (adding edges for `athrow` along the way), then [`Liveness`] works out which locals are
//!      still needed and [`remove_unused_locals`] drops the ones which aren't
//!   3. [`Refiner`] sharpens `int` and `null` locals using how their values are used
//!   4. [`build_ranges`] turns the frames into variable scopes and [`attach_ranges`] writes them
//!      out as table entries, inserting labels where needed
//!   5. [`name_locals`] gives every entry a name
//!
//! [`Pipeline`] runs all of this over a batch of classes.

mod completeness;
mod control_flow;
mod frame;
mod frames;
mod liveness;
mod namer;
mod pipeline;
mod refine;
mod settings;
mod table;
mod types;

pub use completeness::*;
pub use control_flow::*;
pub use frame::*;
pub use frames::*;
pub use liveness::*;
pub use namer::*;
pub use pipeline::*;
pub use refine::*;
pub use settings::*;
pub use table::*;
pub use types::*;
