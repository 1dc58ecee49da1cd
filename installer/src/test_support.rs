// Deterministic `DbConnector` stubs shared by the unit tests.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use crate::database::connection::{ConnectError, DbConnector};
use crate::models::draft::DatabaseProvider;

const FAST_TIMEOUT: Duration = Duration::from_millis(100);

fn failure(transient: bool, attempt: u32) -> ConnectError {
    ConnectError {
        user_message: "Unable to connect. Verify host, credentials, and network access."
            .to_string(),
        internal_details: format!(
            "attempt {}: {}",
            attempt,
            if transient {
                "connection refused"
            } else {
                "login failed for user 'sa'"
            }
        ),
        transient,
    }
}

/// Always reachable.
#[derive(Default)]
pub struct OkStub {
    pub call_count: AtomicU32,
}

#[async_trait]
impl DbConnector for OkStub {
    async fn check_reachable(&self, _: DatabaseProvider, _: &str) -> Result<(), ConnectError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn timeout_duration(&self) -> Duration {
        FAST_TIMEOUT
    }
}

/// Fails immediately on every call.
pub struct ImmediateFailureStub {
    transient: bool,
    attempts: u32,
    pub call_count: AtomicU32,
}

impl ImmediateFailureStub {
    pub fn new(transient: bool, attempts: u32) -> Self {
        Self {
            transient,
            attempts,
            call_count: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl DbConnector for ImmediateFailureStub {
    async fn check_reachable(&self, _: DatabaseProvider, _: &str) -> Result<(), ConnectError> {
        let n = self.call_count.fetch_add(1, Ordering::SeqCst);
        Err(failure(self.transient, n + 1))
    }

    fn timeout_duration(&self) -> Duration {
        FAST_TIMEOUT
    }

    fn max_retries(&self) -> u32 {
        self.attempts
    }
}

/// Never answers; the caller's timeout must fire.
pub struct HangingStub {
    attempts: u32,
    pub call_count: AtomicU32,
}

impl HangingStub {
    pub fn new(attempts: u32) -> Self {
        Self {
            attempts,
            call_count: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl DbConnector for HangingStub {
    async fn check_reachable(&self, _: DatabaseProvider, _: &str) -> Result<(), ConnectError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        std::future::pending::<()>().await;
        Ok(())
    }

    fn timeout_duration(&self) -> Duration {
        FAST_TIMEOUT
    }

    fn max_retries(&self) -> u32 {
        self.attempts
    }
}

/// Transient failures for the first `failures` calls, then success.
pub struct FailThenSucceedStub {
    failures: u32,
    attempts: u32,
    pub call_count: AtomicU32,
}

impl FailThenSucceedStub {
    pub fn new(failures: u32, attempts: u32) -> Self {
        Self {
            failures,
            attempts,
            call_count: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl DbConnector for FailThenSucceedStub {
    async fn check_reachable(&self, _: DatabaseProvider, _: &str) -> Result<(), ConnectError> {
        let n = self.call_count.fetch_add(1, Ordering::SeqCst);
        if n < self.failures {
            Err(failure(true, n + 1))
        } else {
            Ok(())
        }
    }

    fn timeout_duration(&self) -> Duration {
        FAST_TIMEOUT
    }

    fn max_retries(&self) -> u32 {
        self.attempts
    }
}

/// Reachable unless the connection string mentions `unreachable`.
#[derive(Default)]
pub struct KeywordStub;

#[async_trait]
impl DbConnector for KeywordStub {
    async fn check_reachable(
        &self,
        _: DatabaseProvider,
        connection_string: &str,
    ) -> Result<(), ConnectError> {
        if connection_string.to_ascii_lowercase().contains("unreachable") {
            Err(failure(false, 1))
        } else {
            Ok(())
        }
    }

    fn timeout_duration(&self) -> Duration {
        FAST_TIMEOUT
    }

    fn max_retries(&self) -> u32 {
        1
    }
}
