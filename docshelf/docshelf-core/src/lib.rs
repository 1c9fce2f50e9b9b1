pub mod browser;
pub mod caps;
pub mod error;
pub mod events;
pub mod follow;
pub mod model;
pub mod moving;
pub mod nav;
pub mod services;
pub mod store;
pub mod urgency;

pub use error::{EngineError, Result};
