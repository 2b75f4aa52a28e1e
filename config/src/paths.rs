use std::path::PathBuf;

/// Name of the per-application subdirectory used under home, temp and data roots.
pub const APP_DIR_NAME: &str = "imagegen";

pub struct PathManager;

impl PathManager {
    pub fn data_dir() -> Option<PathBuf> {
        dirs::data_dir().map(|d| d.join(APP_DIR_NAME))
    }

    pub fn logs_dir() -> Option<PathBuf> {
        // On macOS, logs usually go to ~/Library/Logs/
        #[cfg(target_os = "macos")]
        {
            if let Some(home) = dirs::home_dir() {
                return Some(home.join("Library/Logs/imagegen"));
            }
        }
        Self::data_dir().map(|d| d.join("logs"))
    }

    pub fn log_file_path() -> Option<PathBuf> {
        Self::logs_dir().map(|d| d.join("imagegen.log"))
    }

    pub fn home_dir() -> Option<PathBuf> {
        dirs::home_dir()
    }

    /// Default output directory under the user's home directory.
    pub fn home_output_dir() -> Option<PathBuf> {
        Self::home_dir().map(|home| home.join("Pictures").join(APP_DIR_NAME))
    }

    /// Last-resort output directory under the system temp root.
    pub fn temp_output_dir() -> PathBuf {
        std::env::temp_dir().join(APP_DIR_NAME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temp_output_dir_is_under_temp_root() {
        let dir = PathManager::temp_output_dir();
        assert!(dir.starts_with(std::env::temp_dir()));
        assert!(dir.ends_with(APP_DIR_NAME));
    }

    #[test]
    fn test_log_file_lives_in_logs_dir() {
        if let (Some(file), Some(dir)) = (PathManager::log_file_path(), PathManager::logs_dir()) {
            assert_eq!(file.parent(), Some(dir.as_path()));
        }
    }
}
