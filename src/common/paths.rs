use std::path::PathBuf;

pub fn system_config_file() -> PathBuf {
    PathBuf::from("/etc/facescan/facescan.toml")
}

pub fn engine_socket_path() -> PathBuf {
    PathBuf::from("/run/facescan/engine.sock")
}

/// Platform data directory, or a local fallback when no home directory exists.
pub fn default_data_dir() -> PathBuf {
    directories::ProjectDirs::from("com", "facescan", "FaceScan")
        .map(|dirs| dirs.data_dir().join("templates"))
        .unwrap_or_else(|| PathBuf::from("/var/lib/facescan/templates"))
}
