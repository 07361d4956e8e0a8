//! Third-party payment processing.
//!
//! The desk charges GoPay through the Midtrans Core API. Charges are created as
//! pending transactions; [`settlement`] applies their side effects once the
//! gateway reports them settled.

pub mod midtrans;
pub mod settlement;

use std::fmt::{Display, Formatter};

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512};
use thiserror::Error;
use uuid::Uuid;

pub use midtrans::MidtransGateway;

/// Failure talking to the payment gateway
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("gateway rejected the request ({status_code}): {message}")]
    Rejected { status_code: String, message: String },
    #[error("gateway response did not include a payment url")]
    MissingPaymentUrl,
    #[error("gateway server key is not configured")]
    NotConfigured,
}

/// What a stored transaction paid for
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TransactionType {
    #[serde(rename = "Top-Up")]
    TopUp,
    #[serde(rename = "Rental Payment")]
    RentalPayment,
    #[serde(rename = "Service Payment")]
    ServicePayment,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::TopUp => "Top-Up",
            TransactionType::RentalPayment => "Rental Payment",
            TransactionType::ServicePayment => "Service Payment",
        }
    }

    /// Prefix of gateway order ids for this type
    pub fn order_prefix(&self) -> &'static str {
        match self {
            TransactionType::TopUp => "order",
            TransactionType::RentalPayment => "rental",
            TransactionType::ServicePayment => "service",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Top-Up" => Some(TransactionType::TopUp),
            "Rental Payment" => Some(TransactionType::RentalPayment),
            "Service Payment" => Some(TransactionType::ServicePayment),
            _ => None,
        }
    }
}

/// Transaction status as reported by the gateway
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(from = "String", into = "String")]
pub enum TransactionStatus {
    Pending,
    Settlement,
    Capture,
    Authorize,
    Deny,
    Cancel,
    Expire,
    Failure,
    Refund,
    PartialRefund,
    Other(String),
}

impl TransactionStatus {
    pub fn as_str(&self) -> &str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Settlement => "settlement",
            TransactionStatus::Capture => "capture",
            TransactionStatus::Authorize => "authorize",
            TransactionStatus::Deny => "deny",
            TransactionStatus::Cancel => "cancel",
            TransactionStatus::Expire => "expire",
            TransactionStatus::Failure => "failure",
            TransactionStatus::Refund => "refund",
            TransactionStatus::PartialRefund => "partial_refund",
            TransactionStatus::Other(s) => s,
        }
    }

    pub fn is_settled(&self) -> bool {
        *self == TransactionStatus::Settlement
    }
}

impl From<String> for TransactionStatus {
    fn from(s: String) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "pending" => TransactionStatus::Pending,
            "settlement" => TransactionStatus::Settlement,
            "capture" => TransactionStatus::Capture,
            "authorize" => TransactionStatus::Authorize,
            "deny" => TransactionStatus::Deny,
            "cancel" => TransactionStatus::Cancel,
            "expire" => TransactionStatus::Expire,
            "failure" => TransactionStatus::Failure,
            "refund" => TransactionStatus::Refund,
            "partial_refund" => TransactionStatus::PartialRefund,
            _ => TransactionStatus::Other(s),
        }
    }
}

impl From<TransactionStatus> for String {
    fn from(status: TransactionStatus) -> Self {
        status.as_str().to_string()
    }
}

impl Display for TransactionStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How the customer pays
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Wallet,
    Gopay,
}

impl PaymentMethod {
    /// Label stored in the transaction_method column
    pub fn label(&self) -> &'static str {
        match self {
            PaymentMethod::Wallet => "Wallet",
            PaymentMethod::Gopay => "GoPay",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "wallet" => Some(PaymentMethod::Wallet),
            "gopay" => Some(PaymentMethod::Gopay),
            _ => None,
        }
    }
}

/// A GoPay charge to create
#[derive(Debug, Clone, PartialEq)]
pub struct ChargeRequest {
    pub order_id: String,
    pub gross_amount: i64,
    pub callback_url: Option<String>,
}

/// Action link returned with a charge (deeplink, QR code, ...)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChargeAction {
    pub name: String,
    #[serde(default)]
    pub method: String,
    pub url: String,
}

/// Gateway response to a charge
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChargeResponse {
    pub status_code: String,
    #[serde(default)]
    pub status_message: String,
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub gross_amount: Option<String>,
    #[serde(default)]
    pub transaction_status: Option<TransactionStatus>,
    #[serde(default)]
    pub actions: Vec<ChargeAction>,
}

impl ChargeResponse {
    /// URL the customer follows to pay
    pub fn payment_url(&self) -> Result<&str, GatewayError> {
        self.actions
            .first()
            .map(|action| action.url.as_str())
            .ok_or(GatewayError::MissingPaymentUrl)
    }
}

/// Gateway view of an existing transaction
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusResponse {
    pub status_code: String,
    #[serde(default)]
    pub status_message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gross_amount: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_time: Option<String>,
    pub transaction_status: TransactionStatus,
}

/// HTTP notification the gateway posts when a transaction changes
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentNotification {
    pub order_id: String,
    pub status_code: String,
    pub gross_amount: String,
    pub signature_key: String,
    pub transaction_status: TransactionStatus,
    #[serde(default)]
    pub transaction_id: Option<String>,
}

impl PaymentNotification {
    pub fn signature_matches(&self, server_key: &str) -> bool {
        let expected =
            notification_signature(&self.order_id, &self.status_code, &self.gross_amount, server_key);
        expected.eq_ignore_ascii_case(&self.signature_key)
    }
}

/// Gateway payment client
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a GoPay charge
    async fn charge_gopay(&self, request: &ChargeRequest) -> Result<ChargeResponse, GatewayError>;

    /// Fetch the current status of an order
    async fn transaction_status(&self, order_id: &str) -> Result<StatusResponse, GatewayError>;
}

/// Unique gateway order id: `{prefix}-{customer}-{unix}-{8 hex}`
pub fn order_id(kind: TransactionType, customer_id: i64) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!(
        "{}-{}-{}-{}",
        kind.order_prefix(),
        customer_id,
        Utc::now().timestamp(),
        &suffix[..8]
    )
}

/// SHA-512 signature the gateway attaches to notifications
pub fn notification_signature(
    order_id: &str,
    status_code: &str,
    gross_amount: &str,
    server_key: &str,
) -> String {
    let mut hasher = Sha512::new();
    hasher.update(order_id.as_bytes());
    hasher.update(status_code.as_bytes());
    hasher.update(gross_amount.as_bytes());
    hasher.update(server_key.as_bytes());
    hex::encode(hasher.finalize())
}

/// Parse a gateway amount such as "50000.00" into whole units
pub fn parse_amount(raw: &str) -> Option<i64> {
    raw.trim().parse::<f64>().ok().map(|v| v.round() as i64)
}
