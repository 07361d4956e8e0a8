use std::future::{ready, Ready};

use actix_web::dev::Payload;
use actix_web::http::header::AUTHORIZATION;
use actix_web::{web, FromRequest, HttpRequest};
use serde::de::DeserializeOwned;

use crate::core::auth::{AdminClaims, AdminRole, CustomerClaims};
use crate::core::error::AppError;
use crate::web::server::AppState;

/// Customer resolved from a bearer token
#[derive(Debug, Clone, Copy)]
pub struct CustomerIdentity {
    pub customer_id: i64,
}

/// Admin resolved from a bearer token
#[derive(Debug, Clone, Copy)]
pub struct AdminIdentity {
    pub admin_id: i64,
    pub role: AdminRole,
}

impl AdminIdentity {
    /// Booking rentals and selling services
    pub fn require_desk(&self) -> Result<(), AppError> {
        if !self.role.can_operate_desk() {
            return Err(AppError::Forbidden(
                "Only admins or super-admins can perform this action".to_string(),
            ));
        }
        Ok(())
    }

    /// Reports and catalog maintenance
    pub fn require_super_admin(&self) -> Result<(), AppError> {
        if !self.role.is_super_admin() {
            return Err(AppError::Forbidden(
                "Only super-admins can perform this action".to_string(),
            ));
        }
        Ok(())
    }
}

fn bearer_claims<C: DeserializeOwned>(req: &HttpRequest) -> Result<C, AppError> {
    let state = req
        .app_data::<web::Data<AppState>>()
        .ok_or_else(|| AppError::internal("Application state is not configured"))?;

    let token = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AppError::Unauthorized("Missing or malformed Authorization header".to_string()))?;

    state.tokens.verify(token)
}

impl FromRequest for CustomerIdentity {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(bearer_claims::<CustomerClaims>(req).map(|claims| CustomerIdentity {
            customer_id: claims.customer_id,
        }))
    }
}

impl FromRequest for AdminIdentity {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(bearer_claims::<AdminClaims>(req).map(|claims| AdminIdentity {
            admin_id: claims.admin_id,
            role: claims.role,
        }))
    }
}
