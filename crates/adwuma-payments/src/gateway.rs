//! Payment gateway abstraction
//!
//! The gateway is the only external I/O boundary in the core. Every call
//! carries a caller-supplied idempotency `reference`: retrying a call with
//! the same reference must not duplicate a financial effect, the provider
//! deduplicates on its side. Calls are wrapped in a timeout; an elapsed
//! timeout classifies as retryable, a rejection as terminal.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use adwuma_common::{GatewayError, PaymentMethodRef};

/// Proof of a settled gateway call
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayReceipt {
    /// The idempotency reference the caller supplied
    pub reference: String,
    /// Provider-side transaction identifier
    pub provider_ref: String,
    pub amount: Decimal,
    pub completed_at: DateTime<Utc>,
}

/// External payment provider operations
///
/// `charge` pulls funds from a client rail into the platform account,
/// `refund` returns a prior charge, `payout` pushes released earnings to a
/// tasker's method. All three deduplicate on `reference`.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn charge(
        &self,
        amount: Decimal,
        method: &PaymentMethodRef,
        reference: &str,
    ) -> Result<GatewayReceipt, GatewayError>;

    async fn refund(&self, amount: Decimal, reference: &str)
        -> Result<GatewayReceipt, GatewayError>;

    async fn payout(
        &self,
        amount: Decimal,
        method: &PaymentMethodRef,
        reference: &str,
    ) -> Result<GatewayReceipt, GatewayError>;
}

#[async_trait]
impl<G: PaymentGateway + ?Sized> PaymentGateway for Arc<G> {
    async fn charge(
        &self,
        amount: Decimal,
        method: &PaymentMethodRef,
        reference: &str,
    ) -> Result<GatewayReceipt, GatewayError> {
        (**self).charge(amount, method, reference).await
    }

    async fn refund(
        &self,
        amount: Decimal,
        reference: &str,
    ) -> Result<GatewayReceipt, GatewayError> {
        (**self).refund(amount, reference).await
    }

    async fn payout(
        &self,
        amount: Decimal,
        method: &PaymentMethodRef,
        reference: &str,
    ) -> Result<GatewayReceipt, GatewayError> {
        (**self).payout(amount, method, reference).await
    }
}

/// Wraps a gateway so every call carries a timeout
///
/// An elapsed timeout maps to `GatewayError::Timeout` and is never silently
/// retried; the caller decides, reusing the same reference so the provider
/// can deduplicate.
pub struct TimeoutGateway<G> {
    inner: G,
    timeout: Duration,
}

impl<G: PaymentGateway> TimeoutGateway<G> {
    pub fn new(inner: G, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    async fn bounded<F>(&self, reference: &str, fut: F) -> Result<GatewayReceipt, GatewayError>
    where
        F: std::future::Future<Output = Result<GatewayReceipt, GatewayError>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(GatewayError::Timeout {
                reference: reference.to_string(),
                elapsed_ms: self.timeout.as_millis() as u64,
            }),
        }
    }
}

#[async_trait]
impl<G: PaymentGateway> PaymentGateway for TimeoutGateway<G> {
    async fn charge(
        &self,
        amount: Decimal,
        method: &PaymentMethodRef,
        reference: &str,
    ) -> Result<GatewayReceipt, GatewayError> {
        self.bounded(reference, self.inner.charge(amount, method, reference))
            .await
    }

    async fn refund(
        &self,
        amount: Decimal,
        reference: &str,
    ) -> Result<GatewayReceipt, GatewayError> {
        self.bounded(reference, self.inner.refund(amount, reference))
            .await
    }

    async fn payout(
        &self,
        amount: Decimal,
        method: &PaymentMethodRef,
        reference: &str,
    ) -> Result<GatewayReceipt, GatewayError> {
        self.bounded(reference, self.inner.payout(amount, method, reference))
            .await
    }
}

/// One transfer the mock actually performed (dedup hits do not add here)
#[derive(Debug, Clone, PartialEq)]
pub struct MockTransfer {
    pub operation: &'static str,
    pub amount: Decimal,
    pub reference: String,
}

/// In-process gateway for tests and local embedding
///
/// Settles every call immediately, keeps an idempotency cache per
/// reference, and can be scripted to fail upcoming calls.
#[derive(Default)]
pub struct MockGateway {
    receipts: DashMap<String, GatewayReceipt>,
    transfers: Mutex<Vec<MockTransfer>>,
    scripted_failures: Mutex<VecDeque<GatewayError>>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Queue a failure for the next non-deduplicated call
    pub fn fail_next(&self, error: GatewayError) {
        self.scripted_failures.lock().push_back(error);
    }

    /// Transfers actually performed, in order
    pub fn transfers(&self) -> Vec<MockTransfer> {
        self.transfers.lock().clone()
    }

    /// How many transfers were performed under a reference
    pub fn transfer_count(&self, reference: &str) -> usize {
        self.transfers
            .lock()
            .iter()
            .filter(|t| t.reference == reference)
            .count()
    }

    fn settle(
        &self,
        operation: &'static str,
        amount: Decimal,
        reference: &str,
    ) -> Result<GatewayReceipt, GatewayError> {
        // Replay of a settled reference returns the original receipt
        if let Some(receipt) = self.receipts.get(reference) {
            debug!(reference = reference, "Mock gateway deduplicated call");
            return Ok(receipt.clone());
        }

        if let Some(error) = self.scripted_failures.lock().pop_front() {
            return Err(error);
        }

        let provider_ref = format!(
            "mock_{}",
            &hex::encode(blake3::hash(reference.as_bytes()).as_bytes())[..12]
        );
        let receipt = GatewayReceipt {
            reference: reference.to_string(),
            provider_ref,
            amount,
            completed_at: Utc::now(),
        };

        self.transfers.lock().push(MockTransfer {
            operation,
            amount,
            reference: reference.to_string(),
        });
        self.receipts.insert(reference.to_string(), receipt.clone());
        Ok(receipt)
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn charge(
        &self,
        amount: Decimal,
        _method: &PaymentMethodRef,
        reference: &str,
    ) -> Result<GatewayReceipt, GatewayError> {
        self.settle("charge", amount, reference)
    }

    async fn refund(
        &self,
        amount: Decimal,
        reference: &str,
    ) -> Result<GatewayReceipt, GatewayError> {
        self.settle("refund", amount, reference)
    }

    async fn payout(
        &self,
        amount: Decimal,
        _method: &PaymentMethodRef,
        reference: &str,
    ) -> Result<GatewayReceipt, GatewayError> {
        self.settle("payout", amount, reference)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adwuma_common::PaymentProvider;
    use rust_decimal_macros::dec;

    fn method() -> PaymentMethodRef {
        PaymentMethodRef::new("pm_1", PaymentProvider::MtnMomo)
    }

    #[tokio::test]
    async fn test_same_reference_settles_once() {
        let gateway = MockGateway::new();

        let first = gateway.payout(dec!(50), &method(), "ref-1").await.unwrap();
        let second = gateway.payout(dec!(50), &method(), "ref-1").await.unwrap();

        assert_eq!(first.provider_ref, second.provider_ref);
        assert_eq!(gateway.transfer_count("ref-1"), 1);
    }

    #[tokio::test]
    async fn test_scripted_failure_then_retry_succeeds() {
        let gateway = MockGateway::new();
        gateway.fail_next(GatewayError::Timeout {
            reference: "ref-2".into(),
            elapsed_ms: 10_000,
        });

        let failed = gateway.payout(dec!(50), &method(), "ref-2").await;
        assert!(matches!(failed, Err(GatewayError::Timeout { .. })));
        assert_eq!(gateway.transfer_count("ref-2"), 0);

        // Retry with the same reference performs exactly one transfer
        gateway.payout(dec!(50), &method(), "ref-2").await.unwrap();
        assert_eq!(gateway.transfer_count("ref-2"), 1);
    }

    #[tokio::test]
    async fn test_timeout_gateway_classifies_elapse() {
        struct SlowGateway;

        #[async_trait]
        impl PaymentGateway for SlowGateway {
            async fn charge(
                &self,
                _amount: Decimal,
                _method: &PaymentMethodRef,
                _reference: &str,
            ) -> Result<GatewayReceipt, GatewayError> {
                tokio::time::sleep(Duration::from_secs(60)).await;
                unreachable!()
            }

            async fn refund(
                &self,
                _amount: Decimal,
                _reference: &str,
            ) -> Result<GatewayReceipt, GatewayError> {
                tokio::time::sleep(Duration::from_secs(60)).await;
                unreachable!()
            }

            async fn payout(
                &self,
                _amount: Decimal,
                _method: &PaymentMethodRef,
                _reference: &str,
            ) -> Result<GatewayReceipt, GatewayError> {
                tokio::time::sleep(Duration::from_secs(60)).await;
                unreachable!()
            }
        }

        tokio::time::pause();
        let gateway = TimeoutGateway::new(SlowGateway, Duration::from_millis(100));

        let result = gateway.charge(dec!(10), &method(), "ref-3").await;
        assert!(matches!(result, Err(GatewayError::Timeout { .. })));
    }
}
