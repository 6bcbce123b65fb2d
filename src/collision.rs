//! Unique destination paths.
//!
//! [`resolve_collision`] is the plain probe: `<base>.ext`, `<base>_1.ext`,
//! `<base>_2.ext`, ... until a name is free on disk. On its own it is a
//! check-then-act race when several workers target the same directory, so the
//! sorter goes through [`DestinationAllocator`], which holds a per-directory
//! lock across the probe and records the granted name as claimed for the rest
//! of the run.

use std::collections::{HashMap, HashSet};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Returns the `n`th suffixed variant of `path` (`photo.jpg` -> `photo_n.jpg`).
pub fn suffixed_path(path: &Path, n: u32) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{}_{}.{}", stem, n, ext.to_string_lossy()),
        None => format!("{}_{}", stem, n),
    };
    path.with_file_name(name)
}

/// Returns `candidate` if nothing exists there, otherwise the first free suffixed variant.
///
/// # Examples
///
/// ```no_run
/// use snapsort::collision::resolve_collision;
/// use std::path::Path;
///
/// let free = resolve_collision(Path::new("/out/2023/04/2023_04_01_153000.jpg"));
/// assert!(!free.exists());
/// ```
pub fn resolve_collision(candidate: &Path) -> PathBuf {
    first_free(candidate, |p| p.exists())
}

fn first_free(candidate: &Path, taken: impl Fn(&Path) -> bool) -> PathBuf {
    if !taken(candidate) {
        return candidate.to_path_buf();
    }
    let mut n = 1;
    loop {
        let next = suffixed_path(candidate, n);
        if !taken(&next) {
            return next;
        }
        n += 1;
    }
}

type ClaimSet = Arc<Mutex<HashSet<OsString>>>;

/// Hands out destination paths that are free on disk and not already granted
/// to another unit in this run.
///
/// Each target directory has its own lock, so workers filling different
/// month buckets never wait on each other.
#[derive(Debug, Default)]
pub struct DestinationAllocator {
    directories: Mutex<HashMap<PathBuf, ClaimSet>>,
}

impl DestinationAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves and claims a unique path for `candidate`.
    pub fn allocate(&self, candidate: &Path) -> PathBuf {
        let directory = candidate.parent().map(Path::to_path_buf).unwrap_or_default();
        let claims = self.claims_for(directory);
        let mut claimed = lock(&claims);

        let granted = first_free(candidate, |p| {
            p.exists() || p.file_name().is_some_and(|name| claimed.contains(name))
        });
        if let Some(name) = granted.file_name() {
            claimed.insert(name.to_os_string());
        }
        granted
    }

    /// Returns a previously granted name, e.g. after a failed move.
    pub fn release(&self, path: &Path) {
        let directory = path.parent().map(Path::to_path_buf).unwrap_or_default();
        let claims = self.claims_for(directory);
        if let Some(name) = path.file_name() {
            lock(&claims).remove(name);
        }
    }

    fn claims_for(&self, directory: PathBuf) -> ClaimSet {
        let mut directories = lock(&self.directories);
        Arc::clone(directories.entry(directory).or_default())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
