//! Simulated payment capability for development and testing.
//!
//! Behaves like a hosted card processor: `initiate` creates an intent with a
//! `pi_…` reference and client secret, `retrieve` reports its outcome along with
//! the metadata it was created with. New intents start in a configurable
//! outcome; tests flip individual intents with [`SimulatedPaymentGateway::complete`]
//! and [`SimulatedPaymentGateway::fail`].

use async_trait::async_trait;
use showtime_core::payment::{
    PaymentCapability, PaymentIntent, PaymentMetadata, PaymentOutcome, PaymentRecord,
};
use showtime_core::{Money, PaymentError};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

/// In-memory payment capability
#[derive(Clone, Debug)]
pub struct SimulatedPaymentGateway {
    intents: Arc<Mutex<HashMap<String, PaymentRecord>>>,
    initial_outcome: PaymentOutcome,
}

impl SimulatedPaymentGateway {
    /// Creates a gateway whose intents start out `initial_outcome`
    #[must_use]
    pub fn new(initial_outcome: PaymentOutcome) -> Self {
        Self {
            intents: Arc::new(Mutex::new(HashMap::new())),
            initial_outcome,
        }
    }

    /// A gateway where every payment succeeds immediately (development server)
    #[must_use]
    pub fn always_succeeding() -> Self {
        Self::new(PaymentOutcome::Succeeded)
    }

    /// Creates an Arc-wrapped instance for sharing
    #[must_use]
    pub fn shared(self) -> Arc<dyn PaymentCapability> {
        Arc::new(self)
    }

    /// Mark an intent as paid. Returns `false` for unknown references.
    pub fn complete(&self, reference: &str) -> bool {
        self.set_outcome(reference, PaymentOutcome::Succeeded)
    }

    /// Mark an intent as declined. Returns `false` for unknown references.
    pub fn fail(&self, reference: &str) -> bool {
        self.set_outcome(reference, PaymentOutcome::Failed)
    }

    /// Number of intents created so far
    #[must_use]
    pub fn intent_count(&self) -> usize {
        self.intents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn set_outcome(&self, reference: &str, outcome: PaymentOutcome) -> bool {
        let mut intents = self.intents.lock().unwrap_or_else(PoisonError::into_inner);
        intents.get_mut(reference).is_some_and(|record| {
            record.status = outcome;
            true
        })
    }
}

impl Default for SimulatedPaymentGateway {
    fn default() -> Self {
        Self::new(PaymentOutcome::Pending)
    }
}

#[async_trait]
impl PaymentCapability for SimulatedPaymentGateway {
    async fn initiate(
        &self,
        amount: Money,
        currency: &str,
        metadata: PaymentMetadata,
    ) -> Result<PaymentIntent, PaymentError> {
        if amount == Money::ZERO {
            return Err(PaymentError::Gateway(
                "Amount must be greater than zero".to_string(),
            ));
        }

        let reference = format!("pi_{}", uuid::Uuid::new_v4().simple());
        let client_secret = format!("{reference}_secret_{}", uuid::Uuid::new_v4().simple());

        self.intents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                reference.clone(),
                PaymentRecord {
                    reference: reference.clone(),
                    status: self.initial_outcome,
                    amount,
                    currency: currency.to_lowercase(),
                    metadata,
                },
            );

        tracing::info!(
            reference = %reference,
            amount = amount.cents(),
            currency,
            "Simulated payment intent created"
        );

        Ok(PaymentIntent {
            reference,
            client_secret,
        })
    }

    async fn retrieve(&self, reference: &str) -> Result<PaymentRecord, PaymentError> {
        self.intents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(reference)
            .cloned()
            .ok_or_else(|| PaymentError::NotFound(reference.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn intent_round_trip_carries_metadata() {
        let gateway = SimulatedPaymentGateway::default();
        let metadata = PaymentMetadata::from([("booking".to_string(), "{}".to_string())]);

        let intent = gateway
            .initiate(Money::from_cents(55_000), "LKR", metadata.clone())
            .await
            .unwrap();
        assert!(intent.reference.starts_with("pi_"));
        assert!(intent.client_secret.starts_with(&intent.reference));

        let record = gateway.retrieve(&intent.reference).await.unwrap();
        assert_eq!(record.status, PaymentOutcome::Pending);
        assert_eq!(record.currency, "lkr");
        assert_eq!(record.metadata, metadata);

        assert!(gateway.complete(&intent.reference));
        let record = gateway.retrieve(&intent.reference).await.unwrap();
        assert_eq!(record.status, PaymentOutcome::Succeeded);
    }

    #[tokio::test]
    async fn unknown_reference_is_not_found() {
        let gateway = SimulatedPaymentGateway::always_succeeding();
        let err = gateway.retrieve("pi_missing").await.unwrap_err();
        assert_eq!(err, PaymentError::NotFound("pi_missing".to_string()));
        assert!(!gateway.fail("pi_missing"));
    }

    #[tokio::test]
    async fn zero_amount_is_rejected() {
        let gateway = SimulatedPaymentGateway::default();
        let result = gateway
            .initiate(Money::ZERO, "lkr", PaymentMetadata::new())
            .await;
        assert!(matches!(result, Err(PaymentError::Gateway(_))));
        assert_eq!(gateway.intent_count(), 0);
    }
}
