pub mod types;
pub mod segment;
pub mod classify;
pub mod collect;

pub use types::*;
pub use segment::*;
pub use classify::*;
pub use collect::*;
