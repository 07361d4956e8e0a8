use std::fmt::{Display, Formatter};
use std::str::FromStr;

use actix_web::web;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::core::error::AppError;

/// Role carried by an admin account and its tokens
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AdminRole {
    #[serde(rename = "admin")]
    Admin,
    #[serde(rename = "super-admin")]
    SuperAdmin,
}

impl AdminRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdminRole::Admin => "admin",
            AdminRole::SuperAdmin => "super-admin",
        }
    }

    /// Both roles may book rentals and sell services
    pub fn can_operate_desk(&self) -> bool {
        matches!(self, AdminRole::Admin | AdminRole::SuperAdmin)
    }

    pub fn is_super_admin(&self) -> bool {
        *self == AdminRole::SuperAdmin
    }
}

impl Display for AdminRole {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AdminRole {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(AdminRole::Admin),
            "super-admin" => Ok(AdminRole::SuperAdmin),
            other => Err(AppError::bad_request(format!("Unknown admin role: {}", other))),
        }
    }
}

/// Claims of a customer session token
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CustomerClaims {
    pub customer_id: i64,
    pub exp: usize,
}

/// Claims of an admin session token
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AdminClaims {
    pub admin_id: i64,
    pub role: AdminRole,
    pub exp: usize,
}

/// Signs and verifies HS256 session tokens
#[derive(Clone)]
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl TokenIssuer {
    pub fn new(secret: &str, ttl_hours: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::hours(ttl_hours),
        }
    }

    fn expiry(&self) -> usize {
        (Utc::now() + self.ttl).timestamp().max(0) as usize
    }

    pub fn issue_customer(&self, customer_id: i64) -> Result<String, AppError> {
        let claims = CustomerClaims {
            customer_id,
            exp: self.expiry(),
        };
        self.sign(&claims)
    }

    pub fn issue_admin(&self, admin_id: i64, role: AdminRole) -> Result<String, AppError> {
        let claims = AdminClaims {
            admin_id,
            role,
            exp: self.expiry(),
        };
        self.sign(&claims)
    }

    fn sign<C: Serialize>(&self, claims: &C) -> Result<String, AppError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| AppError::internal(format!("Failed to generate token: {}", e)))
    }

    /// Decode and validate a token; expiry is enforced
    pub fn verify<C: DeserializeOwned>(&self, token: &str) -> Result<C, AppError> {
        let validation = Validation::new(Algorithm::HS256);
        decode::<C>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|_| AppError::Unauthorized("Invalid or expired token".to_string()))
    }
}

/// Hash a password with bcrypt on the blocking pool
pub async fn hash_password(password: String, cost: u32) -> Result<String, AppError> {
    web::block(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| AppError::internal(format!("Hashing task failed: {}", e)))?
        .map_err(|e| AppError::internal(format!("Failed to hash password: {}", e)))
}

/// Check a password against a stored bcrypt hash
pub async fn verify_password(password: String, hash: String) -> Result<bool, AppError> {
    web::block(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|e| AppError::internal(format!("Verification task failed: {}", e)))?
        // A malformed stored hash is treated as a mismatch
        .or(Ok(false))
}
