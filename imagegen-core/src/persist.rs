//! Writing generated images to disk with fallback locations

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{info, warn};

use crate::error::{PathError, PersistError};
use crate::paths::{OutputLocations, PathResolver};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistenceOutcome {
    /// Where the image actually landed.
    pub path: PathBuf,
    /// Set only when the caller's target failed and a default location was used instead.
    pub warning: Option<String>,
}

/// One place to try, in the order they are attempted.
#[derive(Debug, Clone, Copy)]
enum Attempt<'a> {
    Requested(&'a str),
    Default { index: usize, dir: &'a Path },
}

impl Attempt<'_> {
    fn label(&self) -> String {
        match self {
            Attempt::Requested(_) => "requested path".to_string(),
            Attempt::Default { index, dir } => {
                format!("default location {} ({})", index, dir.display())
            }
        }
    }
}

pub struct ImagePersistor {
    resolver: PathResolver,
}

impl ImagePersistor {
    pub fn new(resolver: PathResolver) -> Self {
        Self { resolver }
    }

    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    /// Save `bytes` to `target`, or to the first default location that works.
    ///
    /// A wrong extension on the caller's target is reported immediately and
    /// never falls back. Attempts run one at a time in priority order.
    pub async fn save(
        &self,
        bytes: &[u8],
        target: Option<&str>,
        locations: &OutputLocations,
    ) -> Result<PersistenceOutcome, PersistError> {
        if bytes.is_empty() {
            return Err(PersistError::EmptyPayload);
        }

        let mut attempts: Vec<Attempt<'_>> = Vec::new();
        if let Some(target) = target {
            attempts.push(Attempt::Requested(target));
        }
        attempts.extend(
            locations
                .directories()
                .iter()
                .enumerate()
                .map(|(i, dir)| Attempt::Default {
                    index: i + 1,
                    dir: dir.as_path(),
                }),
        );

        let mut first_failure: Option<String> = None;
        let mut last_failure: Option<String> = None;

        for attempt in &attempts {
            match self.write_attempt(bytes, *attempt, locations).await {
                Ok(path) => {
                    info!(path = %path.display(), attempt = %attempt.label(), "Image saved");
                    let warning = match (target, attempt, &first_failure) {
                        (Some(requested), Attempt::Default { .. }, Some(first)) => Some(format!(
                            "Could not save to \"{}\" ({}). Saved to a default location instead.",
                            requested, first
                        )),
                        _ => None,
                    };
                    return Ok(PersistenceOutcome { path, warning });
                }
                Err(PathError::InvalidExtension { path, extension })
                    if matches!(attempt, Attempt::Requested(_)) =>
                {
                    return Err(PersistError::InvalidExtension { path, extension });
                }
                Err(err) => {
                    let summary = format!("{}: {}", attempt.label(), err);
                    warn!("Save attempt failed: {}", summary);
                    if first_failure.is_none() {
                        first_failure = Some(summary);
                    }
                    last_failure = Some(err.to_string());
                }
            }
        }

        Err(PersistError::Exhausted {
            last: last_failure.unwrap_or_else(|| "no output location is available".to_string()),
            first: first_failure.filter(|_| attempts.len() > 1),
        })
    }

    async fn write_attempt(
        &self,
        bytes: &[u8],
        attempt: Attempt<'_>,
        locations: &OutputLocations,
    ) -> Result<PathBuf, PathError> {
        let path = match attempt {
            Attempt::Requested(raw) => self.resolver.resolve(Some(raw), None, locations).await?,
            Attempt::Default { dir, .. } => self.resolver.resolve_in_dir(dir).await?,
        };

        fs::write(&path, bytes)
            .await
            .map_err(|e| PathError::io(&path, e))?;

        let written = fs::metadata(&path)
            .await
            .map_err(|e| PathError::io(&path, e))?
            .len();
        if written == 0 {
            return Err(PathError::EmptyWrite { path });
        }
        Ok(path)
    }
}
