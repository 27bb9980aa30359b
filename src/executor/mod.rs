pub mod eval;

pub mod checks;
pub use checks::*;

pub mod backend;
pub use backend::*;

pub mod execution_error;
pub use execution_error::*;

pub mod monitor;
pub use monitor::*;

pub mod row_verifier;
pub use row_verifier::*;

pub mod memory_backend;
pub use memory_backend::*;

pub mod group_state;
pub use group_state::*;

pub mod adaptive_executor;
pub use adaptive_executor::*;

#[cfg(test)]
pub mod _tests;
