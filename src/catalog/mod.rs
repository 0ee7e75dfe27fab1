//! Catalog — agents and guided experiences fetched from the backend.

pub mod model;
pub mod store;

pub use model::{Agent, Experience, Stage, agent_icon};
pub use store::CatalogStore;
