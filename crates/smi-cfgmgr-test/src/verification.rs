//! Verification helpers for testing the SMI fabric manager
//!
//! Provides assertion helpers over the commands a [`MockHost`] recorded.

use crate::MockHost;
use thiserror::Error;

/// Verification error types
#[derive(Error, Debug)]
pub enum VerificationError {
    #[error("Expected command '{command}' was never executed")]
    NotExecuted { command: String },

    #[error("Command '{command}' was executed but should not have been")]
    UnexpectedCommand { command: String },

    #[error("Expected {expected} commands starting with '{prefix}', found {actual}")]
    CountMismatch {
        prefix: String,
        expected: usize,
        actual: usize,
    },

    #[error("Expected {expected} spawned daemons, found {actual}")]
    SpawnCountMismatch { expected: usize, actual: usize },
}

/// Result type for verification operations
pub type VerifyResult<T> = Result<T, VerificationError>;

/// Command log verification helper
pub struct CommandVerifier<'a> {
    host: &'a MockHost,
}

impl<'a> CommandVerifier<'a> {
    /// Create a new verifier over `host`'s command log
    pub fn new(host: &'a MockHost) -> Self {
        Self { host }
    }

    /// Verify that `command` was executed at least once
    pub fn assert_executed(&self, command: &str) -> VerifyResult<()> {
        if self.host.executed().iter().any(|c| c == command) {
            Ok(())
        } else {
            Err(VerificationError::NotExecuted {
                command: command.to_string(),
            })
        }
    }

    /// Verify that no executed command starts with `prefix`
    pub fn assert_none_with_prefix(&self, prefix: &str) -> VerifyResult<()> {
        match self.host.executed().into_iter().find(|c| c.starts_with(prefix)) {
            Some(command) => Err(VerificationError::UnexpectedCommand { command }),
            None => Ok(()),
        }
    }

    /// Verify the number of executed commands starting with `prefix`
    pub fn assert_count_with_prefix(&self, prefix: &str, expected: usize) -> VerifyResult<()> {
        let actual = self
            .host
            .executed()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count();
        if actual == expected {
            Ok(())
        } else {
            Err(VerificationError::CountMismatch {
                prefix: prefix.to_string(),
                expected,
                actual,
            })
        }
    }

    /// Verify the number of daemons spawned
    pub fn assert_spawn_count(&self, expected: usize) -> VerifyResult<()> {
        let actual = self.host.spawned().len();
        if actual == expected {
            Ok(())
        } else {
            Err(VerificationError::SpawnCountMismatch { expected, actual })
        }
    }

    /// Verify that nothing mutating reached the host: no device add/del
    /// and no daemon launch
    pub fn assert_read_only(&self) -> VerifyResult<()> {
        self.assert_none_with_prefix("rdma dev add")?;
        self.assert_none_with_prefix("rdma dev del")?;
        self.assert_spawn_count(0)
    }
}
