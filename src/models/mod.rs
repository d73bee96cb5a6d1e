pub mod common;
pub mod pagination;
pub mod plot;
pub mod prediction;
pub mod show;

pub use common::*;
pub use pagination::*;
pub use plot::*;
pub use prediction::*;
pub use show::*;
