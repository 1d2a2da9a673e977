//! Shared authenticated session management.
//!
//! Login happens once per crawl; the resulting cookie state is
//! persisted to a file behind a PID lock file so concurrent workers
//! and processes reuse one session instead of re-authenticating,
//! which would trip rate limits or invalidate tokens still in use.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::commands::executor::CommandExecutor;
use crate::commands::{ClickCommand, CommandContext, FillCommand};
use crate::config::CrawlConfig;
use crate::driver::PageDriver;
use crate::error::ScoutError;

/// How long a persisted session is trusted before re-login.
const SESSION_FRESHNESS: Duration = Duration::from_secs(8 * 60 * 60);

/// A lock file older than this is considered abandoned.
const LOCK_MAX_AGE: Duration = Duration::from_secs(10 * 60);

/// How long to wait for another process to release the lock.
const LOCK_WAIT: Duration = Duration::from_secs(30);

const USERNAME_SELECTORS: &[&str] = &[
    "input[name='username']",
    "input[name='email']",
    "input[type='email']",
];

const PASSWORD_SELECTOR: &str = "input[type='password']";
const SUBMIT_SELECTOR: &str = "button[type='submit']";

/// Persisted storage state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionState {
    pub saved_at: DateTime<Utc>,
    pub cookies: serde_json::Value,
}

/// Manages the persisted authenticated session.
pub struct SessionManager {
    state_path: PathBuf,
    lock_path: PathBuf,
    freshness: Duration,
}

impl SessionManager {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        let dir = dir.as_ref();
        Self {
            state_path: dir.join("session.json"),
            lock_path: dir.join("session.lock"),
            freshness: SESSION_FRESHNESS,
        }
    }

    pub fn with_freshness(mut self, freshness: Duration) -> Self {
        self.freshness = freshness;
        self
    }

    /// Whether a fresh persisted session exists.
    pub fn has_valid_session(&self) -> bool {
        self.load_state().is_some()
    }

    fn load_state(&self) -> Option<SessionState> {
        let contents = std::fs::read_to_string(&self.state_path).ok()?;
        let state: SessionState = serde_json::from_str(&contents).ok()?;
        let age = Utc::now().signed_duration_since(state.saved_at);
        if age.to_std().is_ok_and(|age| age < self.freshness) {
            Some(state)
        } else {
            ::log::info!("Persisted session is stale; re-authentication required");
            None
        }
    }

    /// Ensure the driver carries an authenticated session.
    ///
    /// No-op when no credentials are configured. When a valid persisted
    /// session exists it is restored without any login interaction;
    /// otherwise login runs under the cross-process lock and the
    /// refreshed state is republished for all workers.
    pub async fn ensure_session(
        &self,
        driver: &Arc<dyn PageDriver>,
        config: &CrawlConfig,
    ) -> Result<(), ScoutError> {
        if !config.has_credentials() {
            return Ok(());
        }

        if let Some(state) = self.load_state() {
            driver.set_cookies(&state.cookies).await?;
            return Ok(());
        }

        let _lock = self.acquire_lock().await?;

        // Another process may have logged in while we waited
        if let Some(state) = self.load_state() {
            driver.set_cookies(&state.cookies).await?;
            return Ok(());
        }

        self.perform_login(driver, config).await?;

        let state = SessionState {
            saved_at: Utc::now(),
            cookies: driver.cookies().await?,
        };
        if let Some(parent) = self.state_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.state_path, serde_json::to_string_pretty(&state)?)?;
        ::log::info!("Authenticated session persisted");
        Ok(())
    }

    /// Drop the persisted session, forcing the next `ensure_session`
    /// to re-authenticate. Called when a redirect-to-login is observed
    /// mid-crawl.
    pub fn invalidate(&self) -> Result<(), ScoutError> {
        if self.state_path.exists() {
            std::fs::remove_file(&self.state_path)?;
            ::log::warn!("Session invalidated");
        }
        Ok(())
    }

    async fn perform_login(
        &self,
        driver: &Arc<dyn PageDriver>,
        config: &CrawlConfig,
    ) -> Result<(), ScoutError> {
        let login_url = config
            .login_url
            .clone()
            .unwrap_or_else(|| config.start_url.clone());
        let username = config
            .username
            .clone()
            .ok_or_else(|| ScoutError::Auth("no username configured".to_string()))?;
        let password = config
            .password
            .clone()
            .ok_or_else(|| ScoutError::Auth("no password configured".to_string()))?;

        ::log::info!("Logging in at {}", login_url);
        driver
            .goto(&login_url)
            .await
            .map_err(|e| ScoutError::Auth(format!("login page unreachable: {e}")))?;
        driver
            .wait_for_load(config.command_timeout())
            .await
            .map_err(|e| ScoutError::Auth(format!("login page never loaded: {e}")))?;

        let executor = CommandExecutor::from_config(config);
        let ctx = CommandContext {
            driver: Arc::clone(driver),
            chain: Arc::new(Mutex::new(Vec::new())),
            correlator: None,
        };

        let mut filled_username = false;
        for selector in USERNAME_SELECTORS {
            if driver
                .find_all(selector)
                .await
                .map(|els| !els.is_empty())
                .unwrap_or(false)
            {
                let fill = FillCommand::new(selector, "username", &username);
                executor
                    .run(&fill, &ctx)
                    .await
                    .map_err(|e| ScoutError::Auth(format!("username field: {e}")))?;
                filled_username = true;
                break;
            }
        }
        if !filled_username {
            return Err(ScoutError::Auth("no username field found".to_string()));
        }

        let fill_password = FillCommand::new(PASSWORD_SELECTOR, "password", &password);
        executor
            .run(&fill_password, &ctx)
            .await
            .map_err(|e| ScoutError::Auth(format!("password field: {e}")))?;

        let submit = ClickCommand::new(SUBMIT_SELECTOR, "submit-login");
        executor
            .run(&submit, &ctx)
            .await
            .map_err(|e| ScoutError::Auth(format!("submit: {e}")))?;

        driver
            .wait_for_load(config.command_timeout())
            .await
            .map_err(|e| ScoutError::Auth(format!("post-login load: {e}")))?;

        let landed = driver.current_url().await?;
        if landed.contains("login") {
            return Err(ScoutError::Auth(format!(
                "still on login page after submit: {landed}"
            )));
        }
        Ok(())
    }

    async fn acquire_lock(&self) -> Result<SessionLock, ScoutError> {
        let deadline = tokio::time::Instant::now() + LOCK_WAIT;
        loop {
            if let Some(parent) = self.lock_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            match std::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&self.lock_path)
            {
                Ok(file) => {
                    use std::io::Write;
                    let mut file = file;
                    write!(file, "{}", std::process::id())?;
                    return Ok(SessionLock {
                        path: self.lock_path.clone(),
                    });
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    if self.lock_is_stale() {
                        ::log::warn!("Breaking stale session lock");
                        let _ = std::fs::remove_file(&self.lock_path);
                        continue;
                    }
                    if tokio::time::Instant::now() >= deadline {
                        return Err(ScoutError::SessionLockConflict);
                    }
                    tokio::time::sleep(Duration::from_millis(200)).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// A lock is stale when its owning process is dead or it has been
    /// held past the maximum age.
    fn lock_is_stale(&self) -> bool {
        let pid_alive = std::fs::read_to_string(&self.lock_path)
            .ok()
            .and_then(|s| s.trim().parse::<u32>().ok())
            .map(|pid| Path::new(&format!("/proc/{pid}")).exists());
        if pid_alive == Some(false) {
            return true;
        }
        std::fs::metadata(&self.lock_path)
            .and_then(|m| m.modified())
            .ok()
            .and_then(|modified| modified.elapsed().ok())
            .is_some_and(|age| age > LOCK_MAX_AGE)
    }
}

/// Holds the session lock file; releases it on drop.
struct SessionLock {
    path: PathBuf,
}

impl Drop for SessionLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            ::log::warn!("Failed to remove session lock: {}", e);
        }
    }
}
