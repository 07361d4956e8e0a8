use actix_web::{web, HttpResponse};
use log::info;
use serde_json::json;

use crate::core::error::AppError;
use crate::store::catalog;
use crate::web::auth::AdminIdentity;
use crate::web::models::{ComputerListQuery, GenericResponse, NewComputerRequest, NewServiceRequest};
use crate::web::server::AppState;

/// List computers, optionally only the free ones
pub async fn list_computers(
    data: web::Data<AppState>,
    query: web::Query<ComputerListQuery>,
) -> Result<HttpResponse, AppError> {
    let only_available = query.available.unwrap_or(false);
    let computers = data
        .store
        .read(|conn| catalog::list_computers(conn, only_available))
        .await?;
    Ok(HttpResponse::Ok().json(GenericResponse::ok(
        "Computers retrieved successfully",
        serde_json::to_value(computers)?,
    )))
}

pub async fn list_services(data: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let services = data.store.read(catalog::list_services).await?;
    Ok(HttpResponse::Ok().json(GenericResponse::ok(
        "Services retrieved successfully",
        serde_json::to_value(services)?,
    )))
}

pub async fn add_computer(
    data: web::Data<AppState>,
    admin: AdminIdentity,
    request: web::Json<NewComputerRequest>,
) -> Result<HttpResponse, AppError> {
    admin.require_super_admin()?;
    if request.name.trim().is_empty() {
        return Err(AppError::bad_request("Field 'name' is required"));
    }

    let id = data
        .store
        .write(|conn| catalog::insert_computer(conn, &request.name, &request.specs, request.hourly_rate))
        .await?;
    info!("Admin {} added computer {} ({})", admin.admin_id, id, request.name);

    Ok(HttpResponse::Ok().json(GenericResponse::ok("Computer added successfully", json!({ "id": id }))))
}

pub async fn add_service(
    data: web::Data<AppState>,
    admin: AdminIdentity,
    request: web::Json<NewServiceRequest>,
) -> Result<HttpResponse, AppError> {
    admin.require_super_admin()?;
    if request.name.trim().is_empty() {
        return Err(AppError::bad_request("Field 'name' is required"));
    }

    let id = data
        .store
        .write(|conn| catalog::insert_service(conn, &request.name, request.price, request.quantity))
        .await?;
    info!("Admin {} added service {} ({})", admin.admin_id, id, request.name);

    Ok(HttpResponse::Ok().json(GenericResponse::ok("Service added successfully", json!({ "id": id }))))
}
