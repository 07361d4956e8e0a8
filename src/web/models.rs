use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::error::AppError;
use crate::store::services::ServiceLine;

/// Customer registration request
#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterCustomerRequest {
    pub name: String,
    pub username: String,
    pub email: String,
    pub password: String,
}

impl RegisterCustomerRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        require("name", &self.name)?;
        require("username", &self.username)?;
        require("password", &self.password)?;
        validate_email(&self.email)
    }
}

/// Admin registration request
#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterAdminRequest {
    pub username: String,
    pub password: String,
    pub role: String,
}

impl RegisterAdminRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        require("username", &self.username)?;
        require("password", &self.password)?;
        require("role", &self.role)
    }
}

/// Customer login request
#[derive(Debug, Serialize, Deserialize)]
pub struct CustomerLoginRequest {
    pub email: String,
    pub password: String,
}

/// Admin login request
#[derive(Debug, Serialize, Deserialize)]
pub struct AdminLoginRequest {
    pub username: String,
    pub password: String,
}

/// Login response
#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
}

/// Wallet balance response
#[derive(Debug, Serialize, Deserialize)]
pub struct WalletBalanceResponse {
    pub balance: i64,
}

/// Wallet payment request
#[derive(Debug, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub amount: i64,
    pub purpose: String,
}

/// Rental booking request
#[derive(Debug, Serialize, Deserialize)]
pub struct RentalRequest {
    pub customer_id: i64,
    pub computer_id: i64,
    pub rental_start: DateTime<Utc>,
    pub rental_end: DateTime<Utc>,
    #[serde(default)]
    pub services: Vec<ServiceLine>,
    #[serde(default)]
    pub activity_description: String,
}

/// `?payment_method=` on rental bookings
#[derive(Debug, Deserialize)]
pub struct PaymentMethodQuery {
    pub payment_method: Option<String>,
}

/// Service purchase request
#[derive(Debug, Serialize, Deserialize)]
pub struct ServicePurchaseRequest {
    pub customer_id: i64,
    pub services: Vec<ServiceLine>,
    pub payment_method: String,
}

/// `?recent=true` on the booking report
#[derive(Debug, Deserialize)]
pub struct BookingReportQuery {
    pub recent: Option<String>,
}

impl BookingReportQuery {
    pub fn only_recent(&self) -> bool {
        self.recent.as_deref() == Some("true")
    }
}

/// Revenue report request; dates are `YYYY-MM-DD`
#[derive(Debug, Serialize, Deserialize)]
pub struct RevenueReportRequest {
    pub start_date: String,
    pub end_date: String,
}

/// New computer request
#[derive(Debug, Serialize, Deserialize)]
pub struct NewComputerRequest {
    pub name: String,
    #[serde(default)]
    pub specs: String,
    pub hourly_rate: i64,
}

/// New service request
#[derive(Debug, Serialize, Deserialize)]
pub struct NewServiceRequest {
    pub name: String,
    pub price: i64,
    pub quantity: i64,
}

/// `?available=true` on the computer listing
#[derive(Debug, Deserialize)]
pub struct ComputerListQuery {
    pub available: Option<bool>,
}

/// Generic response
#[derive(Debug, Serialize, Deserialize)]
pub struct GenericResponse {
    pub success: bool,
    pub message: String,
    pub data: Option<serde_json::Value>,
}

impl GenericResponse {
    pub fn ok(message: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
        }
    }
}

/// Error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub error_code: String,
}

fn require(field: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::bad_request(format!("Field '{}' is required", field)));
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<(), AppError> {
    let valid = email
        .split_once('@')
        .map(|(user, domain)| !user.is_empty() && domain.contains('.') && !domain.starts_with('.'))
        .unwrap_or(false);
    if !valid {
        return Err(AppError::bad_request("Invalid email address"));
    }
    Ok(())
}
