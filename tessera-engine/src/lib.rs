//! Tessera Engine - Query Planner/Executor and Write Path
//!
//! The top-level `Engine` facade plus the planner (mode selection),
//! executor (candidate fetch/filter/paginate), and write path
//! (create/update/delete) that back it.

mod engine;
mod executor;
mod planner;
mod write;

pub use engine::{CreateIndexOptions, Engine, FindOptions};
pub use planner::ExecutionMode;
pub use write::compute_tags;
