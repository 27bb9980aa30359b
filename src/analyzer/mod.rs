pub mod analysis_error;
pub use analysis_error::*;

pub mod complexity;
pub use complexity::*;

pub mod compatibility;
pub use compatibility::*;

pub mod consolidator;
pub use consolidator::*;

pub mod batch;
pub use batch::*;
