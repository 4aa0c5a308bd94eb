pub mod backend;
pub mod config;
pub mod errors;
pub mod hub;
pub mod resource_url;
pub mod script;

pub use config::HubConfig;
pub use errors::HubError;
pub use hub::*;
