//! Registration and login for customers and admins.

use actix_web::{web, HttpResponse};
use log::{info, warn};
use serde_json::json;

use crate::core::auth::{hash_password, verify_password, AdminRole};
use crate::core::error::AppError;
use crate::store::{accounts, activity};
use crate::web::models::{
    AdminLoginRequest, CustomerLoginRequest, GenericResponse, LoginResponse, RegisterAdminRequest,
    RegisterCustomerRequest,
};
use crate::web::server::AppState;

/// Register a customer account
pub async fn register_customer(
    data: web::Data<AppState>,
    request: web::Json<RegisterCustomerRequest>,
) -> Result<HttpResponse, AppError> {
    request.validate()?;
    let request = request.into_inner();

    let password_hash = hash_password(request.password.clone(), data.config.bcrypt_cost).await?;
    let customer_id = data
        .store
        .write(|conn| {
            let id = accounts::insert_customer(
                conn,
                &request.name,
                &request.username,
                &request.email,
                &password_hash,
            )?;
            activity::record(conn, &format!("Customer {} registered with email {}", id, request.email))?;
            Ok(id)
        })
        .await?;

    data.metrics.registrations.with_label_values(&["customer"]).inc();
    info!("Registered customer {}", customer_id);

    Ok(HttpResponse::Ok().json(GenericResponse::ok(
        format!("User {} registered successfully", request.name),
        json!({ "email": request.email }),
    )))
}

/// Exchange customer credentials for a session token
pub async fn login_customer(
    data: web::Data<AppState>,
    request: web::Json<CustomerLoginRequest>,
) -> Result<HttpResponse, AppError> {
    let request = request.into_inner();
    let invalid = || AppError::bad_request("Invalid email or password");

    let credentials = data
        .store
        .read(|conn| accounts::find_customer_by_email(conn, &request.email))
        .await?
        .ok_or_else(invalid)?;

    if !verify_password(request.password, credentials.password_hash.clone()).await? {
        warn!("Failed login for customer {}", credentials.id);
        return Err(invalid());
    }

    let token = data.tokens.issue_customer(credentials.id)?;
    data.store
        .write(|conn| {
            accounts::save_customer_token(conn, credentials.id, &token)?;
            activity::record(conn, &format!("Customer {} logged in", credentials.id))
        })
        .await?;

    data.metrics.logins.with_label_values(&["customer"]).inc();
    Ok(HttpResponse::Ok().json(LoginResponse { token }))
}

/// Register an admin account
pub async fn register_admin(
    data: web::Data<AppState>,
    request: web::Json<RegisterAdminRequest>,
) -> Result<HttpResponse, AppError> {
    request.validate()?;
    let request = request.into_inner();
    let role: AdminRole = request.role.parse()?;

    let password_hash = hash_password(request.password.clone(), data.config.bcrypt_cost).await?;
    let admin_id = data
        .store
        .write(|conn| {
            let id = accounts::insert_admin(conn, &request.username, &password_hash, role)?;
            activity::record(conn, &format!("Admin {} registered with role {}", id, role))?;
            Ok(id)
        })
        .await?;

    data.metrics.registrations.with_label_values(&["admin"]).inc();
    info!("Registered admin {} ({})", admin_id, role);

    Ok(HttpResponse::Ok().json(GenericResponse::ok(
        format!("Admin {} registered successfully", request.username),
        json!({ "role": role }),
    )))
}

/// Exchange admin credentials for a session token carrying the role
pub async fn login_admin(
    data: web::Data<AppState>,
    request: web::Json<AdminLoginRequest>,
) -> Result<HttpResponse, AppError> {
    let request = request.into_inner();
    let invalid = || AppError::bad_request("Invalid username or password");

    let credentials = data
        .store
        .read(|conn| accounts::find_admin_by_username(conn, &request.username))
        .await?
        .ok_or_else(invalid)?;

    if !verify_password(request.password, credentials.password_hash.clone()).await? {
        warn!("Failed login for admin {}", credentials.username);
        return Err(invalid());
    }

    let token = data.tokens.issue_admin(credentials.id, credentials.role)?;
    data.store
        .write(|conn| {
            accounts::save_admin_token(conn, credentials.id, &token)?;
            activity::record(conn, &format!("Admin {} logged in", credentials.id))
        })
        .await?;

    data.metrics.logins.with_label_values(&["admin"]).inc();
    Ok(HttpResponse::Ok().json(LoginResponse { token }))
}
