//! Task graph parsing, validation, and level partitioning.
//!
//! Consumes the external task-graph document (spec.md §6 schema, modeled
//! here as [`swarmforge_types::RawTaskGraph`]) and either returns an
//! immutable, scheduler-ready [`swarmforge_types::TaskGraph`] or the
//! complete list of validation violations. The graph is never partially
//! validated: `validate` is all-or-nothing.

mod error;
mod validator;

pub use error::{GraphInvalid, GraphValidationError};
pub use validator::validate;
