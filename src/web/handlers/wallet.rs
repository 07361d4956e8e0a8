//! Wallet balance, GoPay top-ups and payment confirmation.

use actix_web::{web, HttpResponse};
use log::{info, warn};
use serde_json::json;

use crate::core::error::AppError;
use crate::core::metrics::RentalMetrics;
use crate::payment::settlement::{self, SettlementOutcome};
use crate::payment::{self, ChargeRequest, PaymentNotification, TransactionStatus, TransactionType};
use crate::store::accounts;
use crate::store::transactions::{self, PendingCharge, TransactionRecord};
use crate::web::auth::CustomerIdentity;
use crate::web::models::{GenericResponse, PaymentRequest, WalletBalanceResponse};
use crate::web::server::AppState;

/// A GoPay charge stored as a pending transaction
#[derive(Debug, Clone)]
pub struct GopayCharge {
    pub order_id: String,
    pub payment_url: String,
    pub transaction_id: Option<String>,
    pub status: TransactionStatus,
}

/// Create a GoPay charge and store it as pending.
///
/// The gateway is called outside any SQL transaction; the pending row is only
/// written once the charge exists.
pub async fn start_gopay_charge(
    data: &AppState,
    customer_id: i64,
    kind: TransactionType,
    amount: i64,
    metadata: Option<serde_json::Value>,
) -> Result<GopayCharge, AppError> {
    let order_id = payment::order_id(kind, customer_id);
    let response = data
        .gateway
        .charge_gopay(&ChargeRequest {
            order_id: order_id.clone(),
            gross_amount: amount,
            callback_url: data.config.payment_callback_url.clone(),
        })
        .await?;
    let payment_url = response.payment_url()?.to_string();

    data.store
        .write(|conn| {
            transactions::insert_pending(
                conn,
                &PendingCharge {
                    customer_id,
                    transaction_type: kind,
                    amount,
                    payment_url: &payment_url,
                    order_id: &order_id,
                    metadata,
                },
            )
        })
        .await?;

    data.metrics.payments_created.with_label_values(&[kind.as_str()]).inc();
    info!("Created {} charge {} for customer {}", kind.as_str(), order_id, customer_id);

    Ok(GopayCharge {
        order_id,
        payment_url,
        transaction_id: response.transaction_id,
        status: response.transaction_status.unwrap_or(TransactionStatus::Pending),
    })
}

fn count_outcome(metrics: &RentalMetrics, outcome: &SettlementOutcome) {
    if outcome.newly_settled() {
        metrics.settlements.inc();
    }
    if let SettlementOutcome::RentalRecorded { .. } = outcome {
        metrics.rentals_recorded.inc();
    }
}

/// Reject a gateway-reported amount that differs from the stored order
fn check_amount(record: &TransactionRecord, order_id: &str, reported: Option<&str>) -> Result<(), AppError> {
    if reported.and_then(payment::parse_amount) == Some(record.amount) {
        return Ok(());
    }
    warn!(
        "Gateway reported amount {:?} for order {}, stored {}",
        reported, order_id, record.amount
    );
    Err(AppError::bad_request(format!(
        "Reported amount {} does not match order {}",
        reported.unwrap_or("(none)"),
        order_id
    )))
}

/// Current wallet balance of the caller
pub async fn get_balance(
    data: web::Data<AppState>,
    identity: CustomerIdentity,
) -> Result<HttpResponse, AppError> {
    let balance = data
        .store
        .read(|conn| accounts::wallet_balance(conn, identity.customer_id))
        .await?;
    Ok(HttpResponse::Ok().json(WalletBalanceResponse { balance }))
}

/// Start a GoPay wallet top-up
pub async fn create_payment(
    data: web::Data<AppState>,
    identity: CustomerIdentity,
    request: web::Json<PaymentRequest>,
) -> Result<HttpResponse, AppError> {
    if request.amount <= 0 {
        return Err(AppError::bad_request("Amount must be greater than zero"));
    }
    if request.purpose != TransactionType::TopUp.as_str() {
        return Err(AppError::bad_request(format!(
            "Unsupported payment purpose: {}",
            request.purpose
        )));
    }

    data.store
        .read(|conn| accounts::ensure_customer(conn, identity.customer_id))
        .await?;

    let charge = start_gopay_charge(
        &data,
        identity.customer_id,
        TransactionType::TopUp,
        request.amount,
        None,
    )
    .await?;

    Ok(HttpResponse::Ok().json(GenericResponse::ok(
        "Payment created successfully",
        json!({
            "transaction_id": charge.transaction_id,
            "order_id": charge.order_id,
            "payment_url": charge.payment_url,
            "gross_amount": request.amount,
            "status": charge.status,
        }),
    )))
}

/// Ask the gateway about one of the caller's orders and settle it when paid
pub async fn payment_status(
    data: web::Data<AppState>,
    identity: CustomerIdentity,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let order_id = path.into_inner();

    let record = data.store.read(|conn| settlement::load(conn, &order_id)).await?;
    if record.customer_id != identity.customer_id {
        return Err(AppError::NotFound(format!("Transaction {} not found", order_id)));
    }

    let status = data.gateway.transaction_status(&order_id).await?;
    check_amount(&record, &order_id, status.gross_amount.as_deref())?;
    let outcome = data
        .store
        .write(|conn| settlement::apply_status(conn, &order_id, &status.transaction_status))
        .await?;
    count_outcome(&data.metrics, &outcome);

    Ok(HttpResponse::Ok().json(GenericResponse::ok(
        "Payment status retrieved successfully",
        serde_json::to_value(&status)?,
    )))
}

/// Gateway notification endpoint
pub async fn payment_notification(
    data: web::Data<AppState>,
    notification: web::Json<PaymentNotification>,
) -> Result<HttpResponse, AppError> {
    let notification = notification.into_inner();
    let server_key = &data.config.midtrans_server_key;

    if server_key.is_empty() || !notification.signature_matches(server_key) {
        warn!("Rejected notification for order {}", notification.order_id);
        return Err(AppError::Unauthorized("Invalid notification signature".to_string()));
    }

    let outcome = data
        .store
        .write(|conn| {
            let record = settlement::load(conn, &notification.order_id)?;
            check_amount(&record, &notification.order_id, Some(&notification.gross_amount))?;
            settlement::apply_status(conn, &notification.order_id, &notification.transaction_status)
        })
        .await?;
    count_outcome(&data.metrics, &outcome);
    info!(
        "Notification for order {} applied: {:?}",
        notification.order_id, outcome
    );

    Ok(HttpResponse::Ok().json(GenericResponse::ok(
        "Notification processed",
        json!({
            "order_id": notification.order_id,
            "transaction_status": notification.transaction_status,
        }),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payment::{notification_signature, ChargeAction, ChargeResponse, MockPaymentGateway, StatusResponse};
    use crate::store::fixtures;
    use crate::web::handlers::testing::{bearer, seed};
    use crate::web::server::{configure, test_state, test_state_with};
    use actix_web::http::StatusCode;
    use actix_web::{test, App};
    use serde_json::Value;

    fn charge_response(order_id: &str) -> ChargeResponse {
        ChargeResponse {
            status_code: "201".to_string(),
            status_message: "GoPay transaction is created".to_string(),
            transaction_id: Some("trx-1".to_string()),
            order_id: Some(order_id.to_string()),
            gross_amount: Some("50000.00".to_string()),
            transaction_status: Some(TransactionStatus::Pending),
            actions: vec![ChargeAction {
                name: "generate-qr-code".to_string(),
                method: "GET".to_string(),
                url: "https://pay.example/qr".to_string(),
            }],
        }
    }

    fn settled(order_id: &str) -> StatusResponse {
        StatusResponse {
            status_code: "200".to_string(),
            status_message: "Success".to_string(),
            transaction_id: Some("trx-1".to_string()),
            order_id: Some(order_id.to_string()),
            gross_amount: Some("50000.00".to_string()),
            payment_type: Some("gopay".to_string()),
            transaction_time: None,
            transaction_status: TransactionStatus::Settlement,
        }
    }

    fn pending_top_up(conn: &rusqlite::Connection, customer_id: i64, order_id: &str, amount: i64) {
        transactions::insert_pending(
            conn,
            &PendingCharge {
                customer_id,
                transaction_type: TransactionType::TopUp,
                amount,
                payment_url: "https://pay.example/qr",
                order_id,
                metadata: None,
            },
        )
        .unwrap();
    }

    fn notification(order_id: &str, gross_amount: &str, key: &str) -> Value {
        json!({
            "order_id": order_id,
            "status_code": "200",
            "gross_amount": gross_amount,
            "signature_key": notification_signature(order_id, "200", gross_amount, key),
            "transaction_status": "settlement",
        })
    }

    // Test a top-up is charged, then credited once across two status checks
    #[actix_web::test]
    async fn test_top_up_then_settle_twice() {
        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_charge_gopay()
            .times(1)
            .returning(|request| Ok(charge_response(&request.order_id)));
        gateway
            .expect_transaction_status()
            .times(2)
            .returning(|order_id| Ok(settled(order_id)));

        let state = test_state(gateway);
        let customer = seed(&state, |conn| fixtures::customer(conn, "ana@example.com", 0)).await;
        let token = state.tokens.issue_customer(customer).unwrap();
        let app = test::init_service(App::new().app_data(state.clone()).configure(configure)).await;

        let req = test::TestRequest::post()
            .uri("/customer/wallet/payment")
            .insert_header(bearer(&token))
            .set_json(json!({ "amount": 50000, "purpose": "Top-Up" }))
            .to_request();
        let body: GenericResponse = test::call_and_read_body_json(&app, req).await;
        let data = body.data.unwrap();
        assert_eq!(data["payment_url"], "https://pay.example/qr");
        assert_eq!(data["status"], "pending");
        let order_id = data["order_id"].as_str().unwrap().to_string();
        assert!(order_id.starts_with(&format!("order-{}-", customer)));

        for _ in 0..2 {
            let req = test::TestRequest::get()
                .uri(&format!("/customer/wallet/payment-status/{}", order_id))
                .insert_header(bearer(&token))
                .to_request();
            let body: GenericResponse = test::call_and_read_body_json(&app, req).await;
            assert_eq!(body.data.unwrap()["transaction_status"], "settlement");
        }

        let balance = state
            .store
            .read(|conn| accounts::wallet_balance(conn, customer))
            .await
            .unwrap();
        assert_eq!(balance, 50_000);
        assert_eq!(state.metrics.settlements.get(), 1);
    }

    // Test top-up validation never reaches the gateway
    #[actix_web::test]
    async fn test_top_up_validation() {
        let state = test_state(MockPaymentGateway::new());
        let customer = seed(&state, |conn| fixtures::customer(conn, "ana@example.com", 0)).await;
        let token = state.tokens.issue_customer(customer).unwrap();
        let app = test::init_service(App::new().app_data(state).configure(configure)).await;

        for body in [
            json!({ "amount": 0, "purpose": "Top-Up" }),
            json!({ "amount": 1000, "purpose": "Donation" }),
        ] {
            let req = test::TestRequest::post()
                .uri("/customer/wallet/payment")
                .insert_header(bearer(&token))
                .set_json(body)
                .to_request();
            assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
        }

        let req = test::TestRequest::get().uri("/customer/wallet/balance").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);
    }

    // Test a gateway failure surfaces as 502 and stores nothing
    #[actix_web::test]
    async fn test_gateway_failure() {
        let mut gateway = MockPaymentGateway::new();
        gateway.expect_charge_gopay().returning(|_| {
            Err(payment::GatewayError::Rejected {
                status_code: "401".to_string(),
                message: "Unknown merchant server_key/id".to_string(),
            })
        });
        let state = test_state(gateway);
        let customer = seed(&state, |conn| fixtures::customer(conn, "ana@example.com", 0)).await;
        let token = state.tokens.issue_customer(customer).unwrap();
        let app = test::init_service(App::new().app_data(state.clone()).configure(configure)).await;

        let req = test::TestRequest::post()
            .uri("/customer/wallet/payment")
            .insert_header(bearer(&token))
            .set_json(json!({ "amount": 1000, "purpose": "Top-Up" }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(seed(&state, |conn| fixtures::count(conn, "transactions")).await, 0);
    }

    // Test another customer's order is reported as missing
    #[actix_web::test]
    async fn test_payment_status_of_foreign_order() {
        let state = test_state(MockPaymentGateway::new());
        let (owner, other) = seed(&state, |conn| {
            let owner = fixtures::customer(conn, "a@example.com", 0);
            let other = fixtures::customer(conn, "b@example.com", 0);
            transactions::insert_pending(
                conn,
                &PendingCharge {
                    customer_id: owner,
                    transaction_type: TransactionType::TopUp,
                    amount: 1000,
                    payment_url: "https://pay.example/qr",
                    order_id: "order-a",
                    metadata: None,
                },
            )
            .unwrap();
            (owner, other)
        })
        .await;
        assert_ne!(owner, other);
        let token = state.tokens.issue_customer(other).unwrap();
        let app = test::init_service(App::new().app_data(state).configure(configure)).await;

        let req = test::TestRequest::get()
            .uri("/customer/wallet/payment-status/order-a")
            .insert_header(bearer(&token))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
    }

    // Test notifications are checked against the signature and the stored amount
    #[actix_web::test]
    async fn test_payment_notification() {
        let state = test_state(MockPaymentGateway::new());
        let customer = seed(&state, |conn| {
            let customer = fixtures::customer(conn, "a@example.com", 0);
            transactions::insert_pending(
                conn,
                &PendingCharge {
                    customer_id: customer,
                    transaction_type: TransactionType::TopUp,
                    amount: 50_000,
                    payment_url: "https://pay.example/qr",
                    order_id: "order-n",
                    metadata: None,
                },
            )
            .unwrap();
            customer
        })
        .await;
        let app = test::init_service(App::new().app_data(state.clone()).configure(configure)).await;

        let key = &state.config.midtrans_server_key;
        let notification = |signature: String| {
            json!({
                "order_id": "order-n",
                "status_code": "200",
                "gross_amount": "50000.00",
                "signature_key": signature,
                "transaction_status": "settlement",
            })
        };

        let req = test::TestRequest::post()
            .uri("/webhook/payment")
            .set_json(notification("forged".to_string()))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);

        let signature = notification_signature("order-n", "200", "50000.00", key);
        let req = test::TestRequest::post()
            .uri("/webhook/payment")
            .set_json(notification(signature))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["transaction_status"], "settlement");

        let balance = state
            .store
            .read(|conn| accounts::wallet_balance(conn, customer))
            .await
            .unwrap();
        assert_eq!(balance, 50_000);
    }

    // Test a correctly signed notification whose amount differs from the order is refused
    #[actix_web::test]
    async fn test_notification_amount_mismatch() {
        let state = test_state(MockPaymentGateway::new());
        let customer = seed(&state, |conn| {
            let customer = fixtures::customer(conn, "a@example.com", 0);
            pending_top_up(conn, customer, "order-m", 50_000);
            customer
        })
        .await;
        let app = test::init_service(App::new().app_data(state.clone()).configure(configure)).await;

        let req = test::TestRequest::post()
            .uri("/webhook/payment")
            .set_json(notification("order-m", "5000000.00", &state.config.midtrans_server_key))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

        let (balance, status) = seed(&state, |conn| {
            (
                accounts::wallet_balance(conn, customer).unwrap(),
                settlement::load(conn, "order-m").unwrap().status,
            )
        })
        .await;
        assert_eq!(balance, 0);
        assert_eq!(status, TransactionStatus::Pending);
    }

    // Test notifications are refused outright when no server key is configured
    #[actix_web::test]
    async fn test_notification_without_server_key() {
        let mut config = crate::config::test_config();
        config.midtrans_server_key = String::new();
        let state = test_state_with(config, MockPaymentGateway::new());
        let customer = seed(&state, |conn| {
            let customer = fixtures::customer(conn, "a@example.com", 0);
            pending_top_up(conn, customer, "order-k", 50_000);
            customer
        })
        .await;
        let app = test::init_service(App::new().app_data(state.clone()).configure(configure)).await;

        // Signed with an empty key, as a forger would when the key is unset
        let req = test::TestRequest::post()
            .uri("/webhook/payment")
            .set_json(notification("order-k", "50000.00", ""))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);

        let balance = seed(&state, |conn| accounts::wallet_balance(conn, customer).unwrap()).await;
        assert_eq!(balance, 0);
    }

    // Test a status check reporting a different amount does not settle the order
    #[actix_web::test]
    async fn test_payment_status_amount_mismatch() {
        let mut gateway = MockPaymentGateway::new();
        gateway.expect_transaction_status().times(1).returning(|order_id| {
            let mut status = settled(order_id);
            status.gross_amount = Some("1.00".to_string());
            Ok(status)
        });
        let state = test_state(gateway);
        let customer = seed(&state, |conn| {
            let customer = fixtures::customer(conn, "a@example.com", 0);
            pending_top_up(conn, customer, "order-s", 50_000);
            customer
        })
        .await;
        let token = state.tokens.issue_customer(customer).unwrap();
        let app = test::init_service(App::new().app_data(state.clone()).configure(configure)).await;

        let req = test::TestRequest::get()
            .uri("/customer/wallet/payment-status/order-s")
            .insert_header(bearer(&token))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

        let (balance, status) = seed(&state, |conn| {
            (
                accounts::wallet_balance(conn, customer).unwrap(),
                settlement::load(conn, "order-s").unwrap().status,
            )
        })
        .await;
        assert_eq!(balance, 0);
        assert_eq!(status, TransactionStatus::Pending);
        assert_eq!(state.metrics.settlements.get(), 0);
    }
}
