//! External payment capability.
//!
//! The engine never talks to a provider directly. It hands an amount and opaque
//! metadata to [`PaymentCapability::initiate`], and later asks for the outcome by
//! reference through [`PaymentCapability::retrieve`].

use crate::error::PaymentError;
use crate::types::Money;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Opaque key/value metadata stored with a payment (Stripe-style).
pub type PaymentMetadata = HashMap<String, String>;

/// Outcome of a payment as reported by the provider.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentOutcome {
    /// Funds captured
    Succeeded,
    /// Awaiting customer action
    Pending,
    /// Declined or abandoned
    Failed,
}

impl fmt::Display for PaymentOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Succeeded => "succeeded",
            Self::Pending => "pending",
            Self::Failed => "failed",
        })
    }
}

/// Result of initiating a payment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentIntent {
    /// Provider reference; the idempotency key for finalization
    pub reference: String,
    /// Secret handed to the paying client
    pub client_secret: String,
}

/// A payment as retrieved from the provider.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecord {
    /// Provider reference
    pub reference: String,
    /// Current outcome
    pub status: PaymentOutcome,
    /// Amount requested
    pub amount: Money,
    /// Currency code (lowercase ISO 4217)
    pub currency: String,
    /// Metadata supplied at initiation
    pub metadata: PaymentMetadata,
}

/// Abstraction over a payment provider.
#[async_trait]
pub trait PaymentCapability: Send + Sync {
    /// Start a payment.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::Gateway`] if the provider rejects the request.
    async fn initiate(
        &self,
        amount: Money,
        currency: &str,
        metadata: PaymentMetadata,
    ) -> Result<PaymentIntent, PaymentError>;

    /// Look up a payment by reference.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::NotFound`] for unknown references.
    async fn retrieve(&self, reference: &str) -> Result<PaymentRecord, PaymentError>;
}
