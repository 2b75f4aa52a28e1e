//! Output path resolution
//!
//! A requested location is either a directory (no extension, or a trailing
//! separator) that gets a freshly generated file name, or a file path that
//! must carry a `.jpg`/`.jpeg` extension. Missing directories are created.

use std::path::{Component, Path, PathBuf};

use config::{ImageSettings, PathManager};
use rand::Rng;
use rand::distr::Alphanumeric;
use tokio::fs;
use tracing::warn;

use crate::error::PathError;

/// Extensions accepted for explicit file targets, compared case-insensitively.
pub const IMAGE_EXTENSIONS: [&str; 2] = ["jpg", "jpeg"];

const SUFFIX_LEN: usize = 8;

/// `generated-<UTC timestamp>-<random suffix>.jpg`
///
/// The timestamp sorts lexically and avoids characters that are not
/// filesystem-safe; the suffix keeps names unique within one millisecond.
pub fn unique_filename() -> String {
    let timestamp = chrono::Utc::now().format("%Y-%m-%dT%H-%M-%S-%3fZ");
    let suffix: String = rand::rng()
        .sample_iter(Alphanumeric)
        .take(SUFFIX_LEN)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect();
    format!("generated-{}-{}.jpg", timestamp, suffix)
}

/// Default output directories in priority order, without duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputLocations {
    dirs: Vec<PathBuf>,
}

impl OutputLocations {
    pub fn new(candidates: impl IntoIterator<Item = PathBuf>) -> Self {
        let mut dirs: Vec<PathBuf> = Vec::new();
        for dir in candidates {
            if !dirs.contains(&dir) {
                dirs.push(dir);
            }
        }
        Self { dirs }
    }

    /// Configured directory, then `~/Pictures/imagegen`, then `<temp>/imagegen`.
    pub fn from_settings(settings: &ImageSettings, resolver: &PathResolver) -> Self {
        let configured = settings
            .output_dir
            .as_deref()
            .and_then(|raw| match resolver.absolutize(raw) {
                Ok(dir) => Some(dir),
                Err(e) => {
                    warn!("Ignoring configured output directory: {}", e);
                    None
                }
            });

        Self::new(
            configured
                .into_iter()
                .chain(PathManager::home_output_dir())
                .chain(std::iter::once(PathManager::temp_output_dir())),
        )
    }

    pub fn directories(&self) -> &[PathBuf] {
        &self.dirs
    }

    pub fn first(&self) -> Option<&Path> {
        self.dirs.first().map(PathBuf::as_path)
    }
}

#[derive(Debug, Clone)]
pub struct PathResolver {
    home_dir: Option<PathBuf>,
    working_dir: PathBuf,
}

impl PathResolver {
    pub fn new(home_dir: Option<PathBuf>, working_dir: PathBuf) -> Self {
        Self {
            home_dir,
            working_dir,
        }
    }

    /// Resolver rooted at the process's home and current directories.
    pub fn from_process() -> std::io::Result<Self> {
        Ok(Self::new(PathManager::home_dir(), std::env::current_dir()?))
    }

    /// Validate `raw`, expand `~`, and make it absolute against the working directory.
    pub fn absolutize(&self, raw: &str) -> Result<PathBuf, PathError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(invalid(raw, "path is empty"));
        }
        if trimmed.contains('\0') {
            return Err(invalid(raw, "path contains a NUL byte"));
        }

        let home_relative = if trimmed == "~" {
            Some("")
        } else {
            trimmed.strip_prefix("~/").or_else(|| windows_home_prefix(trimmed))
        };

        let expanded = match home_relative {
            Some(rest) => {
                let home = self
                    .home_dir
                    .as_ref()
                    .ok_or_else(|| invalid(raw, "home directory is unknown"))?;
                if rest.is_empty() {
                    home.clone()
                } else {
                    home.join(rest)
                }
            }
            None => PathBuf::from(trimmed),
        };

        let absolute = if expanded.is_absolute() {
            expanded
        } else {
            self.working_dir.join(expanded)
        };
        Ok(normalize(&absolute))
    }

    /// Decide the exact file to write.
    ///
    /// Uses `target` if given, else `candidate_dir`, else the first default
    /// location. Creates whatever directories the result needs.
    pub async fn resolve(
        &self,
        target: Option<&str>,
        candidate_dir: Option<&Path>,
        locations: &OutputLocations,
    ) -> Result<PathBuf, PathError> {
        let (effective, is_dir) = match (target, candidate_dir) {
            (Some(raw), _) => {
                let trimmed = raw.trim_end();
                (self.absolutize(raw)?, trimmed.ends_with(['/', '\\']))
            }
            (None, Some(dir)) => (dir.to_path_buf(), true),
            (None, None) => {
                let dir = locations
                    .first()
                    .ok_or_else(|| invalid("", "no default output directory is available"))?;
                (dir.to_path_buf(), true)
            }
        };

        let extension = effective
            .extension()
            .map(|ext| ext.to_string_lossy().into_owned());

        match extension {
            Some(extension) if !is_dir => {
                let lowered = extension.to_ascii_lowercase();
                if !IMAGE_EXTENSIONS.contains(&lowered.as_str()) {
                    return Err(PathError::InvalidExtension {
                        path: effective,
                        extension,
                    });
                }
                if let Some(parent) = effective.parent() {
                    fs::create_dir_all(parent)
                        .await
                        .map_err(|e| PathError::io(parent, e))?;
                }
                Ok(effective)
            }
            _ => self.resolve_in_dir(&effective).await,
        }
    }

    /// Fresh unique file inside `dir`, creating `dir` if needed.
    pub async fn resolve_in_dir(&self, dir: &Path) -> Result<PathBuf, PathError> {
        fs::create_dir_all(dir)
            .await
            .map_err(|e| PathError::io(dir, e))?;
        Ok(dir.join(unique_filename()))
    }
}

/// `~\` is home shorthand only where `\` separates path components.
#[cfg(windows)]
fn windows_home_prefix(path: &str) -> Option<&str> {
    path.strip_prefix("~\\")
}

#[cfg(not(windows))]
fn windows_home_prefix(_path: &str) -> Option<&str> {
    None
}

fn invalid(path: &str, reason: &str) -> PathError {
    PathError::InvalidPath {
        path: path.to_string(),
        reason: reason.to_string(),
    }
}

/// Lexically drop `.` and resolve `..` without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
