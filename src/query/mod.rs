//! Query descriptors and the resolved plans the stores execute.

mod descriptor;
mod plan;

pub use descriptor::*;
pub use plan::*;
