//! Agent module - The per-position relay state machine
//!
//! Provides:
//! - Agent roles and lifecycle states
//! - Per-agent token sources
//! - The `Agent` and `Transport` capability traits
//! - `NodeAgent`, which applies the relay rule on every receipt

mod node;
mod role;
mod source;
mod traits;

pub use node::*;
pub use role::*;
pub use source::*;
pub use traits::*;
