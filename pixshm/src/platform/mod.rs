//! OS facilities behind the lifecycle manager: named shared objects,
//! resizing, size queries and mappings.

mod linux;

pub use linux::*;
