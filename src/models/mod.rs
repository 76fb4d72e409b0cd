pub mod common;
pub mod invoice;

pub use common::*;
pub use invoice::*;
