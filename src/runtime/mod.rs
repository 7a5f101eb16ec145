//! Runtime subsystem modules.

pub mod context;
mod core;
pub(crate) mod queue;
pub(crate) mod timer;
mod yield_now;

pub use core::IoLoop;
pub use timer::TimeoutHandle;
pub use yield_now::yield_now;
