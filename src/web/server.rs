use std::sync::Arc;

use actix_web::dev::{Server, Service as _};
use actix_web::{middleware, web, App, HttpServer};
use log::info;

use crate::config::Config;
use crate::core::auth::TokenIssuer;
use crate::core::error::AppError;
use crate::core::metrics::RentalMetrics;
use crate::payment::PaymentGateway;
use crate::store::Store;
use crate::web::handlers;

/// Shared application state for web handlers
pub struct AppState {
    pub store: Store,
    pub gateway: Arc<dyn PaymentGateway>,
    pub tokens: TokenIssuer,
    pub config: Config,
    pub metrics: RentalMetrics,
}

impl AppState {
    pub fn new(config: Config, store: Store, gateway: Arc<dyn PaymentGateway>) -> Result<Self, AppError> {
        let metrics = RentalMetrics::new()
            .map_err(|e| AppError::internal(format!("Failed to register metrics: {}", e)))?;
        Ok(Self {
            store,
            gateway,
            tokens: TokenIssuer::new(&config.jwt_secret, config.token_ttl_hours),
            config,
            metrics,
        })
    }
}

/// Register every route of the rental desk API
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _req| {
        AppError::bad_request(format!("Invalid request body: {}", err)).into()
    }))
    .app_data(web::QueryConfig::default().error_handler(|err, _req| {
        AppError::bad_request(format!("Invalid query string: {}", err)).into()
    }))
    .app_data(web::PathConfig::default().error_handler(|err, _req| {
        AppError::bad_request(format!("Invalid path: {}", err)).into()
    }))
    // Public
    .route("/health", web::get().to(handlers::system::health))
    .route("/metrics", web::get().to(handlers::system::metrics))
    .route("/computers", web::get().to(handlers::catalog::list_computers))
    .route("/services", web::get().to(handlers::catalog::list_services))
    .route("/webhook/payment", web::post().to(handlers::wallet::payment_notification))
    .service(
        web::scope("/customer")
            .route("/register", web::post().to(handlers::accounts::register_customer))
            .route("/login", web::post().to(handlers::accounts::login_customer))
            .route("/wallet/balance", web::get().to(handlers::wallet::get_balance))
            .route("/wallet/payment", web::post().to(handlers::wallet::create_payment))
            .route(
                "/wallet/payment-status/{order_id}",
                web::get().to(handlers::wallet::payment_status),
            )
            .route("/booking/report", web::get().to(handlers::reports::booking_report)),
    )
    .service(
        web::scope("/admin")
            .route("/register", web::post().to(handlers::accounts::register_admin))
            .route("/login", web::post().to(handlers::accounts::login_admin))
            .route("/rental", web::post().to(handlers::rentals::rent_computer))
            .route("/rental/{id}/complete", web::post().to(handlers::rentals::complete_rental))
            .route("/services/purchase", web::post().to(handlers::services::purchase_services))
            .route("/revenue-report", web::post().to(handlers::reports::revenue_report))
            .route("/computers", web::post().to(handlers::catalog::add_computer))
            .route("/services", web::post().to(handlers::catalog::add_service)),
    );
}

/// Bind the rental desk HTTP server.
///
/// The returned [`Server`] is driven by awaiting it; shutdown goes through
/// its handle, so OS signal handling is left to the caller.
pub fn start_web_server(state: AppState) -> std::io::Result<Server> {
    let (host, port) = state.config.bind_address();
    info!("Starting web server on http://{}:{}", host, port);

    let app_state = web::Data::new(state);

    let server = HttpServer::new(move || {
        App::new()
            .wrap_fn(|req, srv| {
                let metrics = req
                    .app_data::<web::Data<AppState>>()
                    .map(|state| state.metrics.clone());
                let fut = srv.call(req);
                async move {
                    let res = fut.await?;
                    if let Some(metrics) = metrics {
                        // Route templates keep the label set bounded
                        let route = res
                            .request()
                            .match_pattern()
                            .unwrap_or_else(|| "unmatched".to_string());
                        metrics.observe(&route, res.status().is_success());
                    }
                    Ok(res)
                }
            })
            .wrap(middleware::Logger::default())
            .app_data(app_state.clone())
            .configure(configure)
    })
    .disable_signals()
    .bind((host, port))?
    .run();

    Ok(server)
}

#[cfg(test)]
pub fn test_state(gateway: crate::payment::MockPaymentGateway) -> web::Data<AppState> {
    test_state_with(crate::config::test_config(), gateway)
}

#[cfg(test)]
pub fn test_state_with(config: Config, gateway: crate::payment::MockPaymentGateway) -> web::Data<AppState> {
    let store = Store::open_in_memory().unwrap();
    web::Data::new(AppState::new(config, store, Arc::new(gateway)).unwrap())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payment::MockPaymentGateway;

    // Test the bound server runs when awaited and stops through its handle
    #[actix_web::test]
    async fn test_start_web_server_stops_through_handle() {
        let store = Store::open_in_memory().unwrap();
        let state = AppState::new(
            crate::config::test_config(),
            store,
            Arc::new(MockPaymentGateway::new()),
        )
        .unwrap();

        let server = start_web_server(state).unwrap();
        let handle = server.handle();
        let running = actix_web::rt::spawn(server);

        handle.stop(true).await;
        assert!(running.await.unwrap().is_ok());
    }
}
