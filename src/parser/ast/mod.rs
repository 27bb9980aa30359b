pub mod query;
pub use query::*;

pub mod clause_collector;
pub use clause_collector::*;

pub mod column;
pub use column::*;

pub mod collection;
pub use collection::*;

pub mod join;
pub use join::*;

pub mod literal;
pub use literal::*;

pub mod operators;
pub use operators::*;

pub mod predicate;
pub use predicate::*;

pub mod truth;
pub use truth::*;

pub mod invocations;
pub use invocations::*;
