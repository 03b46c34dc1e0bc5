pub mod config;
pub mod data_dir;
pub mod error;
pub mod schema;
pub mod store;

pub use config::Config;
pub use data_dir::{DATA_DIR_ENV, DataDir, default_base_dir};
pub use error::{Result, StoreError};
pub use store::SettingsStore;
