//! Cross-process server election lock.
//!
//! The lock is a file created with `create_new`, holding an owner token
//! (`<pid>:<uuid>`). Its mtime is the heartbeat: the holder touches it every
//! `renew`, and a contender treats a lock whose mtime is older than `stale`
//! as abandoned.
//!
//! Reclaiming renames the stale file to a unique tombstone first. Rename is
//! atomic, so when several contenders race for one stale lock only one of
//! them moves it; the others see it gone or fresh and back off.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::LazyLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, SystemTime};

use tokio::sync::Mutex;
use tokio::task::{self, JoinHandle};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::LockError;
use crate::options::{DEFAULT_RENEW, DEFAULT_STALE, TypesOptions};

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> LockError + '_ {
    move |source| LockError::Io {
        path: path.to_path_buf(),
        source,
    }
}

async fn blocking<T, F>(f: F) -> Result<T, LockError>
where
    F: FnOnce() -> Result<T, LockError> + Send + 'static,
    T: Send + 'static,
{
    task::spawn_blocking(f)
        .await
        .map_err(|e| LockError::Join(e.to_string()))?
}

/// Age of `path`'s mtime, or `None` if it does not exist.
fn age(path: &Path) -> io::Result<Option<Duration>> {
    match fs::metadata(path) {
        Ok(meta) => {
            let modified = meta.modified()?;
            Ok(Some(
                SystemTime::now()
                    .duration_since(modified)
                    .unwrap_or(Duration::ZERO),
            ))
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err),
    }
}

fn owner_token() -> String {
    format!("{}:{}", std::process::id(), Uuid::new_v4())
}

/// A lock file location plus its timing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockFile {
    path: PathBuf,
    stale: Duration,
    renew: Duration,
}

impl LockFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            stale: DEFAULT_STALE,
            renew: DEFAULT_RENEW,
        }
    }

    pub fn with_stale(mut self, stale: Duration) -> Self {
        self.stale = stale;
        self
    }

    pub fn with_renew(mut self, renew: Duration) -> Self {
        self.renew = renew;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Non-blocking, zero-retry acquisition.
    ///
    /// `Ok(None)` means a live holder has it. A stale lock is reclaimed and
    /// creation retried once.
    pub async fn try_acquire(&self) -> Result<Option<LockHandle>, LockError> {
        let lock = self.clone();
        let token = owner_token();
        let candidate = token.clone();
        let acquired = blocking(move || lock.acquire_blocking(&candidate)).await?;

        if !acquired {
            debug!(path = %self.path.display(), "lock held by another process");
            return Ok(None);
        }
        info!(path = %self.path.display(), "acquired types server lock");
        Ok(Some(LockHandle::start(self.clone(), token)))
    }

    /// Whether a live (non-stale) lock file is present.
    pub fn is_held(&self) -> bool {
        matches!(age(&self.path), Ok(Some(age)) if age <= self.stale)
    }

    fn acquire_blocking(&self, token: &str) -> Result<bool, LockError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| LockError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        if self.create(token)? {
            return Ok(true);
        }

        match age(&self.path).map_err(io_error(&self.path))? {
            // Released between our create attempt and the stat.
            None => self.create(token),
            Some(age) if age > self.stale => {
                warn!(
                    path = %self.path.display(),
                    age_ms = age.as_millis() as u64,
                    "reclaiming stale types server lock"
                );
                if self.reclaim()? {
                    self.create(token)
                } else {
                    Ok(false)
                }
            }
            Some(_) => Ok(false),
        }
    }

    fn create(&self, token: &str) -> Result<bool, LockError> {
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
        {
            Ok(mut file) => {
                file.write_all(token.as_bytes())
                    .and_then(|()| file.sync_all())
                    .map_err(io_error(&self.path))?;
                Ok(true)
            }
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => Ok(false),
            Err(err) => Err(io_error(&self.path)(err)),
        }
    }

    /// Move a stale lock out of the way. `false` if it turned out to be live.
    fn reclaim(&self) -> Result<bool, LockError> {
        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let tombstone = self
            .path
            .with_file_name(format!("{file_name}.stale-{}", Uuid::new_v4()));

        match fs::rename(&self.path, &tombstone) {
            Ok(()) => {}
            // Another contender got there first.
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(true),
            Err(err) => return Err(io_error(&self.path)(err)),
        }

        let still_stale = match age(&tombstone) {
            Ok(Some(age)) => age > self.stale,
            _ => true,
        };
        if !still_stale {
            // Renewed between our stat and the rename; put it back.
            if let Err(err) = fs::hard_link(&tombstone, &self.path) {
                warn!(path = %self.path.display(), "failed to restore renewed lock: {}", err);
            }
        }
        if let Err(err) = fs::remove_file(&tombstone) {
            debug!(path = %tombstone.display(), "failed to remove lock tombstone: {}", err);
        }
        Ok(still_stale)
    }
}

enum RenewOutcome {
    Renewed,
    Compromised(&'static str),
    Failed(io::Error),
}

fn renew_blocking(path: &Path, token: &str) -> RenewOutcome {
    match fs::read_to_string(path) {
        Ok(owner) if owner == token => {}
        Ok(_) => return RenewOutcome::Compromised("lock file taken over by another owner"),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return RenewOutcome::Compromised("lock file disappeared");
        }
        Err(err) => return RenewOutcome::Failed(err),
    }
    match OpenOptions::new()
        .write(true)
        .open(path)
        .and_then(|file| file.set_modified(SystemTime::now()))
    {
        Ok(()) => RenewOutcome::Renewed,
        Err(err) => RenewOutcome::Failed(err),
    }
}

fn release_blocking(path: &Path, token: &str) -> io::Result<()> {
    match fs::read_to_string(path) {
        Ok(owner) if owner == token => fs::remove_file(path),
        Ok(_) => {
            debug!(path = %path.display(), "lock owned by someone else, leaving it");
            Ok(())
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err),
    }
}

/// A held lock. Renewal runs in the background until release or drop.
#[derive(Debug)]
pub struct LockHandle {
    lock: LockFile,
    token: String,
    compromised: Arc<AtomicBool>,
    renewal: Option<JoinHandle<()>>,
    released: bool,
}

impl LockHandle {
    fn start(lock: LockFile, token: String) -> Self {
        let compromised = Arc::new(AtomicBool::new(false));
        let renewal = tokio::spawn(renew_loop(
            lock.path.clone(),
            token.clone(),
            lock.renew,
            compromised.clone(),
        ));
        Self {
            lock,
            token,
            compromised,
            renewal: Some(renewal),
            released: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.lock.path
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// The lock file vanished or was taken over while we held it.
    pub fn is_compromised(&self) -> bool {
        self.compromised.load(Ordering::SeqCst)
    }

    /// Stop renewing and delete the lock file if it is still ours.
    pub async fn release(mut self) -> Result<(), LockError> {
        self.stop_renewal();
        self.released = true;
        let path = self.lock.path.clone();
        let token = self.token.clone();
        blocking(move || release_blocking(&path, &token).map_err(io_error(&path))).await?;
        debug!(path = %self.lock.path.display(), "released types server lock");
        Ok(())
    }

    fn stop_renewal(&mut self) {
        if let Some(renewal) = self.renewal.take() {
            renewal.abort();
        }
    }
}

impl Drop for LockHandle {
    fn drop(&mut self) {
        self.stop_renewal();
        if !self.released {
            if let Err(err) = release_blocking(&self.lock.path, &self.token) {
                debug!(path = %self.lock.path.display(), "failed to release lock on drop: {}", err);
            }
        }
    }
}

async fn renew_loop(path: PathBuf, token: String, every: Duration, compromised: Arc<AtomicBool>) {
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + every, every);
    loop {
        ticker.tick().await;
        let (p, t) = (path.clone(), token.clone());
        let outcome = match task::spawn_blocking(move || renew_blocking(&p, &t)).await {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(path = %path.display(), "lock renewal task failed: {}", err);
                return;
            }
        };
        match outcome {
            RenewOutcome::Renewed => {}
            RenewOutcome::Failed(err) => {
                warn!(path = %path.display(), "failed to renew lock: {}", err);
            }
            RenewOutcome::Compromised(reason) => {
                error!(path = %path.display(), "types server lock compromised: {}", reason);
                compromised.store(true, Ordering::SeqCst);
                return;
            }
        }
    }
}

/// The process-wide server lock.
static SERVER_LOCK: LazyLock<Mutex<Option<LockHandle>>> = LazyLock::new(|| Mutex::new(None));

/// Whether a server endpoint (possibly stale) exists for these options.
pub fn has_existing_worker(options: &TypesOptions) -> bool {
    options.endpoint().exists()
}

/// Try to become this session's server.
///
/// Returns `true` if this process now holds the lock, including when it
/// already held it. Contention and lock I/O failures both return `false`.
pub async fn try_acquire_server_lock(options: &TypesOptions) -> bool {
    let lock = options.lock_file();
    let mut slot = SERVER_LOCK.lock().await;

    if let Some(held) = slot.as_ref() {
        if held.lock.path == lock.path && !held.is_compromised() {
            return true;
        }
    }
    if let Some(previous) = slot.take() {
        if let Err(err) = previous.release().await {
            warn!("failed to release previous server lock: {}", err);
        }
    }

    match lock.try_acquire().await {
        Ok(Some(handle)) => {
            *slot = Some(handle);
            true
        }
        Ok(None) => false,
        Err(err) => {
            warn!(path = %lock.path.display(), "server lock acquisition failed: {}", err);
            false
        }
    }
}

/// Release the process-wide lock, if held. Never fails.
pub async fn release_server_lock() {
    let Some(handle) = SERVER_LOCK.lock().await.take() else {
        return;
    };
    if let Err(err) = handle.release().await {
        warn!("failed to release server lock: {}", err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs::File;
    use tempfile::TempDir;

    fn lock_in(temp: &TempDir) -> LockFile {
        LockFile::new(temp.path().join("types.lock"))
    }

    fn backdate(path: &Path, by: Duration) {
        let file = File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() - by).unwrap();
    }

    #[tokio::test]
    async fn test_second_acquire_is_refused() {
        let temp = TempDir::new().unwrap();
        let lock = lock_in(&temp);

        let held = lock.try_acquire().await.unwrap().expect("first acquire");
        assert!(lock.try_acquire().await.unwrap().is_none());
        assert!(lock.is_held());
        assert_eq!(fs::read_to_string(lock.path()).unwrap(), held.token());
        assert!(held.token().starts_with(&format!("{}:", std::process::id())));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_acquire_has_one_winner() {
        let temp = TempDir::new().unwrap();
        let lock = lock_in(&temp);

        let attempts = (0..8).map(|_| {
            let lock = lock.clone();
            tokio::spawn(async move { lock.try_acquire().await.unwrap() })
        });
        let results = futures::future::join_all(attempts).await;
        let winners: Vec<LockHandle> = results
            .into_iter()
            .filter_map(|r| r.unwrap())
            .collect();
        assert_eq!(winners.len(), 1);
    }

    #[tokio::test]
    async fn test_stale_lock_is_reclaimed() {
        let temp = TempDir::new().unwrap();
        let lock = lock_in(&temp);
        fs::write(lock.path(), "999999:crashed").unwrap();
        backdate(lock.path(), Duration::from_secs(10));

        let handle = lock.try_acquire().await.unwrap().expect("reclaimed");
        assert_eq!(fs::read_to_string(lock.path()).unwrap(), handle.token());

        let leftovers: Vec<_> = fs::read_dir(temp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(leftovers.len(), 1, "tombstone left behind: {leftovers:?}");
    }

    #[tokio::test]
    async fn test_renewed_lock_is_not_reclaimed() {
        let temp = TempDir::new().unwrap();
        let lock = lock_in(&temp)
            .with_stale(Duration::from_millis(300))
            .with_renew(Duration::from_millis(50));

        let _held = lock.try_acquire().await.unwrap().expect("first acquire");
        tokio::time::sleep(Duration::from_millis(600)).await;

        assert!(lock.try_acquire().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unrenewed_lock_goes_stale() {
        let temp = TempDir::new().unwrap();
        let lock = lock_in(&temp).with_stale(Duration::from_millis(100));
        fs::write(lock.path(), "other").unwrap();

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(!lock.is_held());
        assert!(lock.try_acquire().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_takeover_marks_handle_compromised() {
        let temp = TempDir::new().unwrap();
        let lock = lock_in(&temp).with_renew(Duration::from_millis(30));
        let handle = lock.try_acquire().await.unwrap().unwrap();

        fs::write(lock.path(), "1:intruder").unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert!(handle.is_compromised());
        handle.release().await.unwrap();
        // Not ours any more, so release leaves it.
        assert_eq!(fs::read_to_string(lock.path()).unwrap(), "1:intruder");
    }

    #[tokio::test]
    async fn test_release_and_drop_remove_file() {
        let temp = TempDir::new().unwrap();
        let lock = lock_in(&temp);

        let handle = lock.try_acquire().await.unwrap().unwrap();
        handle.release().await.unwrap();
        assert!(!lock.path().exists());

        let handle = lock.try_acquire().await.unwrap().unwrap();
        drop(handle);
        assert!(!lock.path().exists());
    }

    #[tokio::test]
    #[serial]
    async fn test_process_lock_slot() {
        let temp = TempDir::new().unwrap();
        let options = TypesOptions::new().with_socket_dir(temp.path());
        let lock_path = options.lock_file().path().to_path_buf();

        assert!(try_acquire_server_lock(&options).await);
        assert!(try_acquire_server_lock(&options).await, "re-acquire while held");
        assert!(lock_path.exists());

        release_server_lock().await;
        assert!(!lock_path.exists());
        release_server_lock().await;
    }

    #[tokio::test]
    #[serial]
    async fn test_process_lock_refused_when_held_elsewhere() {
        let temp = TempDir::new().unwrap();
        let options = TypesOptions::new().with_socket_dir(temp.path());
        let _other = options.lock_file().try_acquire().await.unwrap().unwrap();

        assert!(!try_acquire_server_lock(&options).await);
        release_server_lock().await;
    }
}
