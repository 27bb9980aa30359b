pub mod cost_model;
pub use cost_model::*;

pub mod execution_group;
pub use execution_group::*;

pub mod execution_plan;
pub use execution_plan::*;

pub mod plan_builder;
pub use plan_builder::*;
