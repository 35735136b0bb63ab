//! Stream combinators for sample subscriptions

pub mod coalesce;

pub use coalesce::{Coalesce, CoalesceExt};
