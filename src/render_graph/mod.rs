//! Render Graph System
//!
//! The compositor records its GPU work as an ordered list of passes per frame.
//! The host inserts them at the configured [`RenderPassEvent`] and the
//! [`RenderGraphExecutor`] replays them against a backend in recorded order.

pub mod executor;
pub mod graph;
pub mod pass;
pub mod resource;

pub use executor::*;
pub use graph::*;
pub use pass::*;
pub use resource::*;
