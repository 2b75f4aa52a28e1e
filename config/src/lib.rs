pub mod env;
pub mod paths;
pub mod settings;

pub use env::{EnvSource, MapEnv, ProcessEnv};
pub use paths::PathManager;
pub use settings::ImageSettings;

/// Load environment variables from ./.env, then from ~/.env.
/// Variables already set in the process are never overwritten, so the
/// process environment wins over ./.env, which wins over ~/.env.
pub fn load_env_file() {
    dotenv::dotenv().ok();

    if let Some(home) = dirs::home_dir() {
        let home_env_path = home.join(".env");
        dotenv::from_path(home_env_path).ok();
    }
}
