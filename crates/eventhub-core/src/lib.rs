pub mod config;
pub mod error;
pub mod types;

pub use config::EventhubConfig;
pub use error::{EventhubError, Result};
pub use types::{Identity, Role, UserId};
