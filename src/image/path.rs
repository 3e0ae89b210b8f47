use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::ImageError;

/// How a filesystem reference was searched, kept so a not-found error can
/// tell the caller whether supplying `project_root` would help.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RootAttempt {
    Absolute,
    NoProjectRoot,
    ProjectRoot(PathBuf),
    RootNotADirectory(PathBuf),
}

impl fmt::Display for RootAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RootAttempt::Absolute => write!(f, "absolute path, project root not applied"),
            RootAttempt::NoProjectRoot => {
                write!(f, "relative path used without specifying project_root")
            }
            RootAttempt::ProjectRoot(root) => write!(
                f,
                "tried directly and under project root: {}",
                root.display()
            ),
            RootAttempt::RootNotADirectory(root) => write!(
                f,
                "tried directly; project root {} is not an existing directory",
                root.display()
            ),
        }
    }
}

/// Ordered filesystem locations to try for one reference.
#[derive(Debug, Clone)]
pub struct PathCandidates {
    paths: Vec<PathBuf>,
    attempt: RootAttempt,
}

impl PathCandidates {
    /// Build the candidate list. The literal path always comes first; a
    /// relative path is additionally joined onto `project_root` when that is
    /// an existing directory.
    pub fn new(path: &str, project_root: Option<&Path>) -> Self {
        let literal = PathBuf::from(path);

        if literal.is_absolute() {
            return Self {
                paths: vec![literal],
                attempt: RootAttempt::Absolute,
            };
        }

        let Some(root) = project_root else {
            return Self {
                paths: vec![literal],
                attempt: RootAttempt::NoProjectRoot,
            };
        };

        // Joining an empty reference would just name the root directory.
        if !root.is_dir() || path.is_empty() {
            return Self {
                paths: vec![literal],
                attempt: RootAttempt::RootNotADirectory(root.to_path_buf()),
            };
        }

        Self {
            paths: vec![literal, root.join(path)],
            attempt: RootAttempt::ProjectRoot(root.to_path_buf()),
        }
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn attempt(&self) -> &RootAttempt {
        &self.attempt
    }

    /// Read the first candidate that exists and is readable.
    ///
    /// A candidate that exists but cannot be read for lack of permission does
    /// not stop the search; it only decides the error reported once every
    /// candidate has failed.
    pub async fn read_first(self, reference: &str) -> Result<(PathBuf, Vec<u8>), ImageError> {
        let mut denied: Option<PathBuf> = None;

        for candidate in &self.paths {
            match tokio::fs::read(candidate).await {
                Ok(bytes) => {
                    debug!(path = %candidate.display(), bytes = bytes.len(), "image file read");
                    return Ok((candidate.clone(), bytes));
                }
                Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::NotADirectory) => {
                    debug!(path = %candidate.display(), "candidate does not exist");
                }
                Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                    warn!(path = %candidate.display(), "permission denied, trying next candidate");
                    denied = Some(candidate.clone());
                }
                Err(e) => {
                    return Err(ImageError::Unclassifiable {
                        reference: reference.to_string(),
                        reason: format!("{}: {e}", candidate.display()),
                    });
                }
            }
        }

        if let Some(path) = denied {
            return Err(ImageError::AccessDenied { path });
        }

        Err(ImageError::NotFound {
            path: reference.to_string(),
            attempt: self.attempt,
        })
    }
}
