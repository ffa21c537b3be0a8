//! Library-wide validation and rename repair.
//!
//! Both passes work one picture (or one file) at a time and check the
//! cancellation flag before each unit. Work finished before cancellation
//! stays done.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::ingest::hash_file;
use crate::library::Library;
use crate::picture::Picture;
use crate::store::canonical_ext;

/// Progress messages sent while a pass runs.
#[derive(Debug, Clone)]
pub enum IntegrityProgress {
    Validating { current: usize, total: usize, id: i64 },
    Failed(ValidationFailure),
    Examining { current: usize, total: usize, path: PathBuf },
    Restored(Restored),
    RepairFailed(RepairFailure),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    /// Stored bytes no longer match the recorded sum.
    BadSum,
    /// No file at the canonical path.
    Missing,
    /// Any other read failure.
    Io(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationFailure {
    pub id: i64,
    pub name: String,
    pub path: PathBuf,
    pub kind: FailureKind,
}

#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub checked: usize,
    pub failures: Vec<ValidationFailure>,
    pub cancelled: bool,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// A stray file moved back onto its canonical path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Restored {
    pub id: i64,
    pub from: PathBuf,
    pub to: PathBuf,
}

/// A stray that matched a picture but could not be moved into place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepairFailure {
    pub id: i64,
    pub path: PathBuf,
    pub error: String,
}

#[derive(Debug, Clone, Default)]
pub struct RepairReport {
    /// Untracked files hashed.
    pub examined: usize,
    pub restored: Vec<Restored>,
    pub failures: Vec<RepairFailure>,
    pub cancelled: bool,
}

pub struct IntegrityChecker<'lib> {
    lib: &'lib Library,
    cancel_flag: Arc<AtomicBool>,
}

impl<'lib> IntegrityChecker<'lib> {
    pub fn new(lib: &'lib Library) -> Self {
        Self::with_cancel_flag(lib, Arc::new(AtomicBool::new(false)))
    }

    /// Use a flag shared with whoever may want to stop the pass.
    pub fn with_cancel_flag(lib: &'lib Library, cancel_flag: Arc<AtomicBool>) -> Self {
        Self { lib, cancel_flag }
    }

    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel_flag)
    }

    pub fn cancel(&self) {
        self.cancel_flag.store(true, Ordering::Relaxed);
    }

    fn is_cancelled(&self) -> bool {
        self.cancel_flag.load(Ordering::Relaxed)
    }

    /// Validate every picture in the library.
    pub fn validate_all(
        &self,
        progress_tx: Option<mpsc::Sender<IntegrityProgress>>,
    ) -> Result<ValidationReport> {
        let pictures = self.lib.list(0, 0)?;
        Ok(self.validate(&pictures, progress_tx))
    }

    /// Validate `pictures` in order. Side-effect free apart from progress
    /// messages.
    pub fn validate(
        &self,
        pictures: &[Picture<'_>],
        progress_tx: Option<mpsc::Sender<IntegrityProgress>>,
    ) -> ValidationReport {
        let total = pictures.len();
        let mut report = ValidationReport::default();

        for (i, picture) in pictures.iter().enumerate() {
            if self.is_cancelled() {
                report.cancelled = true;
                break;
            }
            if let Some(ref tx) = progress_tx {
                let _ = tx.send(IntegrityProgress::Validating {
                    current: i + 1,
                    total,
                    id: picture.id,
                });
            }

            report.checked += 1;
            let kind = match picture.validate() {
                Ok(()) => continue,
                Err(Error::BadSum { .. }) => FailureKind::BadSum,
                Err(e) if e.is_not_found() => FailureKind::Missing,
                Err(e) => FailureKind::Io(e.to_string()),
            };
            let failure = ValidationFailure {
                id: picture.id,
                name: picture.name.clone(),
                path: picture.filepath(),
                kind,
            };
            debug!(id = failure.id, kind = ?failure.kind, "validation failed");
            if let Some(ref tx) = progress_tx {
                let _ = tx.send(IntegrityProgress::Failed(failure.clone()));
            }
            report.failures.push(failure);
        }

        report
    }

    /// Move untracked files whose content matches a picture with a missing
    /// canonical file back onto that path. Files matching nothing, or
    /// matching a picture whose file is present, are left alone. A file
    /// that cannot be moved is recorded in `failures` and the pass goes on.
    pub fn repair_renames(
        &self,
        progress_tx: Option<mpsc::Sender<IntegrityProgress>>,
    ) -> Result<RepairReport> {
        let untracked = self.lib.untracked()?;
        let total = untracked.len();
        let mut report = RepairReport::default();

        for (i, path) in untracked.into_iter().enumerate() {
            if self.is_cancelled() {
                report.cancelled = true;
                break;
            }
            if let Some(ref tx) = progress_tx {
                let _ = tx.send(IntegrityProgress::Examining {
                    current: i + 1,
                    total,
                    path: path.clone(),
                });
            }

            report.examined += 1;
            let hashed = match hash_file(&path) {
                Ok(h) => h,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "could not hash untracked file");
                    continue;
                }
            };

            let Some(picture) = self.lib.find_by_sum(&hashed.sum)? else {
                continue;
            };
            let canonical = picture.filepath();
            if canonical.exists() {
                continue;
            }

            let adopted = {
                let _writes = self.lib.lock_writes();
                self.lib
                    .store()
                    .adopt(&path, &picture.sum, &canonical_ext(&picture.name))
            };
            let to = match adopted {
                Ok(to) => to,
                Err(e) => {
                    warn!(id = picture.id, path = %path.display(), error = %e, "could not restore renamed original");
                    let failure = RepairFailure {
                        id: picture.id,
                        path,
                        error: e.to_string(),
                    };
                    if let Some(ref tx) = progress_tx {
                        let _ = tx.send(IntegrityProgress::RepairFailed(failure.clone()));
                    }
                    report.failures.push(failure);
                    continue;
                }
            };
            info!(id = picture.id, from = %path.display(), to = %to.display(), "restored renamed original");

            let restored = Restored {
                id: picture.id,
                from: path,
                to,
            };
            if let Some(ref tx) = progress_tx {
                let _ = tx.send(IntegrityProgress::Restored(restored.clone()));
            }
            report.restored.push(restored);
        }

        Ok(report)
    }
}
