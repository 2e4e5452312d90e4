use directories::ProjectDirs;
use std::path::PathBuf;

/// Centralized application directory resolution
pub struct AppDirs;

impl AppDirs {
    fn project() -> Option<ProjectDirs> {
        ProjectDirs::from("", "", "cardspot")
    }

    pub fn state_dir() -> PathBuf {
        if let Ok(home) = std::env::var("HOME") {
            PathBuf::from(home)
                .join(".local")
                .join("state")
                .join("cardspot")
        } else if let Some(proj_dirs) = Self::project() {
            proj_dirs.data_local_dir().to_path_buf()
        } else {
            PathBuf::from(".")
        }
    }

    pub fn config_path() -> PathBuf {
        match Self::project() {
            Some(pd) => pd.config_dir().join("config.json"),
            None => PathBuf::from("cardspot_config.json"),
        }
    }

    pub fn db_path() -> PathBuf {
        Self::state_dir().join("history.db")
    }

    pub fn log_path() -> PathBuf {
        Self::state_dir().join("cardspot.log")
    }
}
