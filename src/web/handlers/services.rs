use actix_web::{web, HttpResponse};
use log::info;
use serde_json::json;

use crate::core::error::AppError;
use crate::core::pricing;
use crate::payment::settlement::ServicePurchase;
use crate::payment::{PaymentMethod, TransactionType};
use crate::store::services::{self, PricedLine};
use crate::store::{accounts, transactions};
use crate::web::auth::AdminIdentity;
use crate::web::handlers::wallet::start_gopay_charge;
use crate::web::models::{GenericResponse, ServicePurchaseRequest};
use crate::web::server::AppState;

/// Sell services to a customer outside of a rental
pub async fn purchase_services(
    data: web::Data<AppState>,
    admin: AdminIdentity,
    request: web::Json<ServicePurchaseRequest>,
) -> Result<HttpResponse, AppError> {
    admin.require_desk()?;
    let request = request.into_inner();
    if request.services.is_empty() {
        return Err(AppError::bad_request("At least one service is required"));
    }
    let method = PaymentMethod::parse(&request.payment_method)
        .ok_or_else(|| AppError::bad_request("Invalid payment method"))?;

    let quote = |conn: &rusqlite::Connection| -> Result<(Vec<PricedLine>, i64), AppError> {
        accounts::ensure_customer(conn, request.customer_id)?;
        let priced = services::quote_lines(conn, &request.services)?;
        let total_cost = pricing::total(priced.iter().map(|line| line.cost))?;
        Ok((priced, total_cost))
    };

    match method {
        PaymentMethod::Wallet => {
            let (priced, total_cost) = data
                .store
                .write(|conn| {
                    let (priced, total_cost) = quote(conn)?;
                    accounts::debit_wallet(conn, request.customer_id, total_cost)?;
                    transactions::insert_wallet_payment(
                        conn,
                        request.customer_id,
                        TransactionType::ServicePayment,
                        total_cost,
                    )?;
                    services::apply_lines(conn, None, request.customer_id, &request.services)?;
                    Ok((priced, total_cost))
                })
                .await?;
            info!(
                "Admin {} sold {} service line(s) to customer {} for {}",
                admin.admin_id,
                priced.len(),
                request.customer_id,
                total_cost
            );

            Ok(HttpResponse::Ok().json(GenericResponse::ok(
                "Services purchased successfully",
                json!({ "total_cost": total_cost, "services": priced }),
            )))
        }
        PaymentMethod::Gopay => {
            let (_, total_cost) = data.store.read(quote).await?;
            let metadata = serde_json::to_value(ServicePurchase {
                services: services::merge_lines(&request.services)?,
            })?;
            let charge = start_gopay_charge(
                &data,
                request.customer_id,
                TransactionType::ServicePayment,
                total_cost,
                Some(metadata),
            )
            .await?;

            Ok(HttpResponse::Ok().json(GenericResponse::ok(
                "Payment initiated",
                json!({
                    "payment_url": charge.payment_url,
                    "order_id": charge.order_id,
                    "total_cost": total_cost,
                }),
            )))
        }
    }
}
