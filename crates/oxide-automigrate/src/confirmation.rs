//! Critical-change confirmation.
//!
//! Deleting a column loses data, so a pass containing deletions only runs when
//! the operator repeats a short-lived code issued by a previous attempt. The
//! code is kept in `<history_dir>/__critical_confirmation_code.json`.
//!
//! ```text
//! NoDeletionPending
//! DeletionDetected ── issue code ──> AwaitingConfirmation ──> Confirmed
//!                                            └── 600 s ──> Expired ── issue code ──> ...
//! ```

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use rand::RngExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{MigrateError, Result};

/// File name of the stored code inside the history directory.
pub const CONFIRMATION_FILE: &str = "__critical_confirmation_code.json";

/// Seconds a code stays valid.
pub const CODE_TTL_SECONDS: i64 = 600;

/// Digits per code.
pub const CODE_LENGTH: usize = 6;

/// A persisted confirmation code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CriticalCode {
    /// Decimal digits.
    pub code: String,
    /// Expiry as unix seconds.
    pub expiration: i64,
}

impl CriticalCode {
    /// Draws a fresh code valid for [`CODE_TTL_SECONDS`] from `now`.
    #[must_use]
    pub fn generate(now: DateTime<Utc>) -> Self {
        let mut rng = rand::rng();
        let code = (0..CODE_LENGTH)
            .map(|_| char::from(b'0' + rng.random_range(0..10u8)))
            .collect();
        Self {
            code,
            expiration: (now + Duration::seconds(CODE_TTL_SECONDS)).timestamp(),
        }
    }

    /// Returns the expiry instant.
    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.expiration, 0).unwrap_or_default()
    }

    /// Returns whether the code can no longer be used at `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now.timestamp() > self.expiration
    }

    /// Returns whether `supplied` confirms this code at `now`.
    #[must_use]
    pub fn is_valid(&self, supplied: &str, now: DateTime<Utc>) -> bool {
        !self.is_expired(now) && self.code == supplied
    }
}

/// Where a pass stands with respect to confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateState {
    /// No column is deleted; nothing to confirm.
    NoDeletionPending,
    /// A deletion is pending and no code has been issued.
    DeletionDetected,
    /// A code has been issued and is waiting to be supplied.
    AwaitingConfirmation {
        code: String,
        expires_at: DateTime<Utc>,
    },
    /// The pass may run.
    Confirmed,
    /// The issued code timed out.
    Expired,
}

/// File-backed confirmation gate.
#[derive(Debug, Clone)]
pub struct ConfirmationGate {
    path: PathBuf,
    required: bool,
}

impl ConfirmationGate {
    /// Creates a gate storing its code under `history_dir`.
    pub fn new(history_dir: impl AsRef<Path>, required: bool) -> Self {
        Self {
            path: history_dir.as_ref().join(CONFIRMATION_FILE),
            required,
        }
    }

    /// Returns the code file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the stored code, if any.
    pub async fn load(&self) -> Result<Option<CriticalCode>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn store(&self, code: &CriticalCode) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, serde_json::to_vec_pretty(code)?).await?;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Reports the state of a pending deletion without changing anything.
    pub async fn inspect(&self, supplied: Option<&str>, now: DateTime<Utc>) -> Result<GateState> {
        let Some(stored) = self.load().await? else {
            return Ok(GateState::DeletionDetected);
        };
        if stored.is_expired(now) {
            return Ok(GateState::Expired);
        }
        match supplied {
            Some(code) if stored.is_valid(code, now) => Ok(GateState::Confirmed),
            _ => Ok(GateState::AwaitingConfirmation {
                expires_at: stored.expires_at(),
                code: stored.code,
            }),
        }
    }

    /// Advances the gate for a pass.
    ///
    /// A confirmed code is consumed. Any other outcome with a deletion pending
    /// issues a fresh code and returns `AwaitingConfirmation`.
    pub async fn evaluate(
        &self,
        has_deletions: bool,
        supplied: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<GateState> {
        if !has_deletions {
            return Ok(GateState::NoDeletionPending);
        }
        if !self.required {
            debug!("Critical confirmation disabled, deletion allowed");
            return Ok(GateState::Confirmed);
        }

        match self.inspect(supplied, now).await? {
            GateState::Confirmed => {
                self.clear().await?;
                info!("Critical change confirmed");
                Ok(GateState::Confirmed)
            }
            previous => {
                if previous == GateState::Expired {
                    debug!("Critical confirmation code expired");
                }
                let fresh = CriticalCode::generate(now);
                self.store(&fresh).await?;
                warn!(
                    code = %fresh.code,
                    expires_at = %fresh.expires_at(),
                    "Column deletion requires confirmation"
                );
                Ok(GateState::AwaitingConfirmation {
                    expires_at: fresh.expires_at(),
                    code: fresh.code,
                })
            }
        }
    }

    /// Evaluates the gate now and turns a pending confirmation into an error.
    pub async fn authorize(&self, has_deletions: bool, supplied: Option<&str>) -> Result<()> {
        match self.evaluate(has_deletions, supplied, Utc::now()).await? {
            GateState::AwaitingConfirmation { code, expires_at } => {
                Err(MigrateError::NeedsConfirmation { code, expires_at })
            }
            _ => Ok(()),
        }
    }

    /// Like [`authorize`](Self::authorize), but a confirmed code is kept for
    /// the pass that applies the change.
    pub async fn verify(&self, has_deletions: bool, supplied: Option<&str>) -> Result<()> {
        if has_deletions
            && self.required
            && self.inspect(supplied, Utc::now()).await? == GateState::Confirmed
        {
            return Ok(());
        }
        self.authorize(has_deletions, supplied).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn test_generate() {
        let code = CriticalCode::generate(now());
        assert_eq!(code.code.len(), CODE_LENGTH);
        assert!(code.code.chars().all(|c| c.is_ascii_digit()));
        assert_eq!(code.expiration, now().timestamp() + 600);
        assert_eq!(code.expires_at(), now() + Duration::seconds(600));
    }

    #[test]
    fn test_validity_window() {
        let code = CriticalCode::generate(now());
        let digits = code.code.clone();
        assert!(code.is_valid(&digits, now()));
        assert!(code.is_valid(&digits, now() + Duration::seconds(600)));
        assert!(!code.is_valid(&digits, now() + Duration::seconds(601)));
        assert!(!code.is_valid("not-it", now()));
    }

    #[tokio::test]
    async fn test_no_deletion() {
        let dir = TempDir::new().unwrap();
        let gate = ConfirmationGate::new(dir.path(), true);
        assert_eq!(
            gate.evaluate(false, None, now()).await.unwrap(),
            GateState::NoDeletionPending
        );
        assert!(!gate.path().exists());
    }

    #[tokio::test]
    async fn test_disabled_gate_allows_deletion() {
        let dir = TempDir::new().unwrap();
        let gate = ConfirmationGate::new(dir.path(), false);
        assert_eq!(
            gate.evaluate(true, None, now()).await.unwrap(),
            GateState::Confirmed
        );
    }

    #[tokio::test]
    async fn test_issue_then_confirm() {
        let dir = TempDir::new().unwrap();
        let gate = ConfirmationGate::new(dir.path(), true);
        assert_eq!(
            gate.inspect(None, now()).await.unwrap(),
            GateState::DeletionDetected
        );

        let code = match gate.evaluate(true, None, now()).await.unwrap() {
            GateState::AwaitingConfirmation { code, expires_at } => {
                assert_eq!(expires_at, now() + Duration::seconds(600));
                code
            }
            other => panic!("expected AwaitingConfirmation, got {other:?}"),
        };
        assert_eq!(gate.load().await.unwrap().unwrap().code, code);

        let later = now() + Duration::seconds(30);
        assert_eq!(
            gate.evaluate(true, Some(&code), later).await.unwrap(),
            GateState::Confirmed
        );
        // Consumed.
        assert!(gate.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_code_is_replaced() {
        let dir = TempDir::new().unwrap();
        let gate = ConfirmationGate::new(dir.path(), true);
        let GateState::AwaitingConfirmation { code, .. } =
            gate.evaluate(true, None, now()).await.unwrap()
        else {
            panic!("expected a code");
        };

        let late = now() + Duration::seconds(601);
        assert_eq!(
            gate.inspect(Some(&code), late).await.unwrap(),
            GateState::Expired
        );
        match gate.evaluate(true, Some(&code), late).await.unwrap() {
            GateState::AwaitingConfirmation { expires_at, .. } => {
                assert_eq!(expires_at, late + Duration::seconds(600));
            }
            other => panic!("expected a fresh code, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_authorize_reports_code() {
        let dir = TempDir::new().unwrap();
        let gate = ConfirmationGate::new(dir.path(), true);
        match gate.authorize(true, Some("000000")).await {
            Err(MigrateError::NeedsConfirmation { code, .. }) => assert_eq!(code.len(), 6),
            other => panic!("expected NeedsConfirmation, got {other:?}"),
        }
        assert!(gate.authorize(false, None).await.is_ok());
    }

    #[tokio::test]
    async fn test_verify_keeps_confirmed_code() {
        let dir = TempDir::new().unwrap();
        let gate = ConfirmationGate::new(dir.path(), true);
        let code = match gate.verify(true, None).await {
            Err(MigrateError::NeedsConfirmation { code, .. }) => code,
            other => panic!("expected NeedsConfirmation, got {other:?}"),
        };

        gate.verify(true, Some(&code)).await.unwrap();
        assert_eq!(gate.load().await.unwrap().unwrap().code, code);

        gate.authorize(true, Some(&code)).await.unwrap();
        assert!(gate.load().await.unwrap().is_none());
    }
}
