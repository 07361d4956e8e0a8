use actix_web::{web, HttpResponse, Responder};
use chrono::Utc;
use log::error;
use serde_json::json;

use crate::web::server::AppState;

/// Liveness plus a database round trip
pub async fn health(data: web::Data<AppState>) -> impl Responder {
    let database = data
        .store
        .read(|conn| Ok(conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?))
        .await;

    match database {
        Ok(_) => HttpResponse::Ok().json(json!({
            "status": "ok",
            "database": "ok",
            "version": env!("CARGO_PKG_VERSION"),
            "timestamp": Utc::now(),
        })),
        Err(e) => {
            error!("Health check failed: {:?}", e);
            HttpResponse::ServiceUnavailable().json(json!({
                "status": "degraded",
                "database": "unavailable",
                "version": env!("CARGO_PKG_VERSION"),
                "timestamp": Utc::now(),
            }))
        }
    }
}

/// Prometheus scrape endpoint
pub async fn metrics(data: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(data.metrics.render())
}
