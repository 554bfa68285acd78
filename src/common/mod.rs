pub mod config;
pub mod error;
pub mod paths;

pub use config::Config;
pub use error::{FaceScanError, Result};
pub use paths::{default_data_dir, engine_socket_path, system_config_file};
