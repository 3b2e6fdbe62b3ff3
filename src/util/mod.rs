//! Shared utility helpers.

pub mod error;
pub(crate) mod math;

pub use error::{GraphError, LocateError, MatchError, ResolutionError, Result as MatchResult};
