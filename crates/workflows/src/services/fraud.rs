//! Fraud check collaborator.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use domain::{CustomerId, Money};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;

use crate::error::{Result, WorkflowError};

const ACTIVITY: &str = "fraud_check";

/// Body posted to a fraud check endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FraudCheckRequest {
    pub customer_id: CustomerId,
    pub charge: Money,
}

/// Response of a fraud check endpoint.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct FraudCheckResponse {
    pub declined: bool,
}

/// Decides whether a charge may go ahead.
#[async_trait]
pub trait FraudCheck: Send + Sync {
    /// Returns true if the charge is declined.
    async fn check(&self, customer_id: &CustomerId, charge: Money) -> Result<bool>;

    /// False for checks that decide nothing and are not reported as fraud
    /// checks.
    fn is_remote(&self) -> bool {
        true
    }
}

/// Pass-through check used when no endpoint is configured. Never declines.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFraudCheck;

#[async_trait]
impl FraudCheck for NoFraudCheck {
    async fn check(&self, _customer_id: &CustomerId, _charge: Money) -> Result<bool> {
        Ok(false)
    }

    fn is_remote(&self) -> bool {
        false
    }
}

/// Remote fraud check service.
///
/// POSTs a [`FraudCheckRequest`] to `<base_url>/check` and reads a
/// [`FraudCheckResponse`]. Non-2xx responses are side-effect failures.
#[derive(Debug, Clone)]
pub struct HttpFraudCheck {
    client: reqwest::Client,
    check_url: String,
}

impl HttpFraudCheck {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            client,
            check_url: format!("{}/check", base_url.trim_end_matches('/')),
        }
    }

    pub fn check_url(&self) -> &str {
        &self.check_url
    }
}

#[async_trait]
impl FraudCheck for HttpFraudCheck {
    async fn check(&self, customer_id: &CustomerId, charge: Money) -> Result<bool> {
        let request = FraudCheckRequest {
            customer_id: customer_id.clone(),
            charge,
        };

        let response = self
            .client
            .post(&self.check_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| WorkflowError::side_effect(ACTIVITY, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(WorkflowError::side_effect(
                ACTIVITY,
                format!("fraud check request failed: {status}: {body}"),
            ));
        }

        let result: FraudCheckResponse = response
            .json()
            .await
            .map_err(|e| WorkflowError::side_effect(ACTIVITY, format!("failed to decode response: {e}")))?;

        Ok(result.declined)
    }
}

/// In-memory fraud check for testing.
///
/// Declines configured customers. A check can be held back with
/// [`InMemoryFraudCheck::hold`] until [`InMemoryFraudCheck::release`] is
/// called, to keep billing in flight while a test drives other parts.
#[derive(Debug, Clone)]
pub struct InMemoryFraudCheck {
    declined: Arc<RwLock<HashSet<CustomerId>>>,
    gate: Arc<RwLock<Option<Arc<Semaphore>>>>,
    checks: Arc<AtomicUsize>,
    unavailable: Arc<AtomicBool>,
}

impl Default for InMemoryFraudCheck {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryFraudCheck {
    pub fn new() -> Self {
        Self {
            declined: Arc::default(),
            gate: Arc::default(),
            checks: Arc::default(),
            unavailable: Arc::default(),
        }
    }

    /// Declines every charge for `customer_id`.
    pub fn decline(&self, customer_id: impl Into<CustomerId>) {
        self.declined
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(customer_id.into());
    }

    /// Holds every subsequent check until `release` is called.
    pub fn hold(&self) {
        *self.gate.write().unwrap_or_else(PoisonError::into_inner) =
            Some(Arc::new(Semaphore::new(0)));
    }

    /// Lets held and future checks through.
    pub fn release(&self) {
        if let Some(gate) = self.gate.write().unwrap_or_else(PoisonError::into_inner).take() {
            gate.close();
        }
    }

    /// Makes every subsequent check fail as if the service were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Returns the number of checks that completed.
    pub fn check_count(&self) -> usize {
        self.checks.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FraudCheck for InMemoryFraudCheck {
    async fn check(&self, customer_id: &CustomerId, _charge: Money) -> Result<bool> {
        let gate = self
            .gate
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(gate) = gate {
            // A closed semaphore is the release signal.
            let _ = gate.acquire().await;
        }
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(WorkflowError::side_effect(ACTIVITY, "fraud check unavailable"));
        }

        self.checks.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .declined
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(customer_id))
    }
}
