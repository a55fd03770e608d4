use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::time::Duration;

use rand::Rng;
use tracing::{debug, warn};

use crate::config::PathsConfig;
use crate::error::{RehashError, Result, VideoError};

/// Characters used in output name tokens. Lowercase keeps names stable on
/// case-insensitive filesystems.
const NAME_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const NAME_TOKEN_LEN: usize = 12;
const NAME_ATTEMPTS: usize = 16;

/// The three filesystem areas every job moves through: input staging,
/// scratch for intermediates, output for final artifacts.
#[derive(Debug, Clone)]
pub struct Workspace {
    staging: PathBuf,
    scratch: PathBuf,
    output: PathBuf,
}

impl Workspace {
    pub fn new(paths: &PathsConfig) -> Self {
        Self {
            staging: paths.staging_dir.clone(),
            scratch: paths.scratch_dir.clone(),
            output: paths.output_dir.clone(),
        }
    }

    /// Create all three areas if missing. Must run before any job does.
    pub fn prepare(&self) -> Result<()> {
        fs::create_dir_all(&self.staging)?;
        fs::create_dir_all(&self.scratch)?;
        fs::create_dir_all(&self.output)?;
        Ok(())
    }

    pub fn staging(&self) -> &Path {
        &self.staging
    }

    pub fn scratch(&self) -> &Path {
        &self.scratch
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Private scratch directory for one job, removed when the guard drops.
    /// Created exclusively; an existing directory means a job id collision
    /// and fails the job instead of sharing intermediates with another one.
    pub fn job_scratch(&self, job_id: &str) -> Result<ScratchDir> {
        let path = self.scratch.join(job_id);
        if let Err(e) = fs::create_dir(&path) {
            if e.kind() == io::ErrorKind::AlreadyExists {
                return Err(RehashError::pipeline(format!(
                    "scratch directory for {} already exists",
                    job_id
                )));
            }
            return Err(e.into());
        }
        Ok(ScratchDir { path })
    }

    /// Copy the final artifact into the output area under a fresh random
    /// name. The target is created exclusively, so an existing file is
    /// never overwritten; a name collision just retries with a new name.
    pub fn promote(&self, artifact: &Path, keep_source: bool) -> Result<PathBuf> {
        for _ in 0..NAME_ATTEMPTS {
            let dest = self.output.join(output_file_name());

            let file = match OpenOptions::new().write(true).create_new(true).open(&dest) {
                Ok(file) => file,
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(e) if e.kind() == io::ErrorKind::StorageFull => {
                    return Err(VideoError::InsufficientSpace {
                        path: dest.display().to_string(),
                    }
                    .into());
                }
                Err(e) => return Err(e.into()),
            };

            return match copy_into(artifact, file) {
                Ok(()) => {
                    if !keep_source {
                        if let Err(e) = fs::remove_file(artifact) {
                            warn!("failed to remove promoted intermediate: {}", e);
                        }
                    }
                    debug!("promoted {} -> {}", artifact.display(), dest.display());
                    Ok(dest)
                }
                Err(e) => {
                    // A partial file must never stay visible in the output area
                    let _ = fs::remove_file(&dest);
                    if e.kind() == io::ErrorKind::StorageFull {
                        Err(VideoError::InsufficientSpace {
                            path: dest.display().to_string(),
                        }
                        .into())
                    } else {
                        Err(e.into())
                    }
                }
            };
        }

        Err(RehashError::pipeline("could not allocate a unique output name"))
    }

    /// Remove scratch entries older than `max_age`, returning how many were
    /// removed. Interrupted runs must not leak disk forever.
    pub fn sweep_stale(&self, max_age: Duration) -> Result<usize> {
        let mut removed = 0;

        for entry in fs::read_dir(&self.scratch)? {
            let entry = match entry {
                Ok(entry) => entry,
                Err(_) => continue,
            };
            let path = entry.path();

            let age = entry
                .metadata()
                .and_then(|meta| meta.modified())
                .ok()
                .and_then(|modified| modified.elapsed().ok());
            let stale = matches!(age, Some(age) if age >= max_age);
            if !stale {
                continue;
            }

            let result = if path.is_dir() {
                fs::remove_dir_all(&path)
            } else {
                fs::remove_file(&path)
            };
            match result {
                Ok(()) => removed += 1,
                Err(e) => warn!("failed to sweep {}: {}", path.display(), e),
            }
        }

        if removed > 0 {
            debug!("swept {} stale scratch entries", removed);
        }
        Ok(removed)
    }
}

fn copy_into(src: &Path, mut dest: File) -> io::Result<()> {
    let mut reader = BufReader::new(File::open(src)?);
    io::copy(&mut reader, &mut dest)?;
    Ok(())
}

/// Random collision-resistant output name: `vid_<token>_<suffix>.mp4`.
/// The token is never derived from the input name or its content, so an
/// output name cannot be correlated back to an input.
pub fn output_file_name() -> String {
    let mut rng = rand::thread_rng();
    let token: String = (0..NAME_TOKEN_LEN)
        .map(|_| NAME_CHARSET[rng.gen_range(0..NAME_CHARSET.len())] as char)
        .collect();
    let suffix = chrono::Utc::now().timestamp() % 1_000_000;
    format!("vid_{}_{:06}.mp4", token, suffix)
}

/// Per-job scratch directory, removed on drop no matter how the job ended
#[derive(Debug)]
pub struct ScratchDir {
    path: PathBuf,
}

impl ScratchDir {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_dir_all(&self.path) {
            if e.kind() != io::ErrorKind::NotFound {
                warn!(
                    "failed to remove scratch directory {}: {}",
                    self.path.display(),
                    e
                );
            }
        }
    }
}
