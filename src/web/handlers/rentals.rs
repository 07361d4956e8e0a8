//! Desk rentals: booking a computer and closing the booking.

use actix_web::{web, HttpResponse};
use log::info;
use serde_json::json;

use crate::core::error::AppError;
use crate::core::pricing;
use crate::payment::{PaymentMethod, TransactionType};
use crate::store::rentals::{self, RentalBooking};
use crate::store::{accounts, transactions};
use crate::web::auth::AdminIdentity;
use crate::web::handlers::wallet::start_gopay_charge;
use crate::web::models::{GenericResponse, PaymentMethodQuery, RentalRequest};
use crate::web::server::AppState;

/// Book a computer for a customer, paid from the wallet or through GoPay
pub async fn rent_computer(
    data: web::Data<AppState>,
    admin: AdminIdentity,
    query: web::Query<PaymentMethodQuery>,
    request: web::Json<RentalRequest>,
) -> Result<HttpResponse, AppError> {
    admin.require_desk()?;
    let method = query
        .payment_method
        .as_deref()
        .and_then(PaymentMethod::parse)
        .ok_or_else(|| AppError::bad_request("Invalid payment method"))?;
    let request = request.into_inner();

    match method {
        PaymentMethod::Wallet => {
            let (rental_id, quote) = data
                .store
                .write(|conn| {
                    accounts::ensure_customer(conn, request.customer_id)?;
                    let quote = rentals::quote(
                        conn,
                        request.computer_id,
                        request.rental_start,
                        request.rental_end,
                        &request.services,
                    )?;
                    accounts::debit_wallet(conn, request.customer_id, quote.total_cost)?;
                    transactions::insert_wallet_payment(
                        conn,
                        request.customer_id,
                        TransactionType::RentalPayment,
                        quote.total_cost,
                    )?;
                    let rental_id = rentals::record_rental(conn, &booking(&request, admin.admin_id, quote.total_cost))?;
                    Ok((rental_id, quote))
                })
                .await?;

            data.metrics.rentals_recorded.inc();
            info!(
                "Admin {} rented computer {} to customer {} for {}",
                admin.admin_id, request.computer_id, request.customer_id, quote.total_cost
            );

            Ok(HttpResponse::Ok().json(GenericResponse::ok(
                "Rental recorded successfully",
                json!({
                    "rental_history": rental_id,
                    "total_cost": quote.total_cost,
                    "rental_duration": pricing::duration_hours(request.rental_start, request.rental_end),
                    "quote": quote,
                }),
            )))
        }
        PaymentMethod::Gopay => {
            let quote = data
                .store
                .read(|conn| {
                    accounts::ensure_customer(conn, request.customer_id)?;
                    rentals::quote(
                        conn,
                        request.computer_id,
                        request.rental_start,
                        request.rental_end,
                        &request.services,
                    )
                })
                .await?;

            let metadata = serde_json::to_value(booking(&request, admin.admin_id, quote.total_cost))?;
            let charge = start_gopay_charge(
                &data,
                request.customer_id,
                TransactionType::RentalPayment,
                quote.total_cost,
                Some(metadata),
            )
            .await?;

            Ok(HttpResponse::Ok().json(GenericResponse::ok(
                "Payment initiated",
                json!({
                    "payment_url": charge.payment_url,
                    "order_id": charge.order_id,
                    "total_cost": quote.total_cost,
                }),
            )))
        }
    }
}

fn booking(request: &RentalRequest, admin_id: i64, total_cost: i64) -> RentalBooking {
    RentalBooking {
        customer_id: request.customer_id,
        computer_id: request.computer_id,
        admin_id,
        rental_start: request.rental_start,
        rental_end: request.rental_end,
        total_cost,
        activity_description: request.activity_description.clone(),
        services: request.services.clone(),
    }
}

/// Close a booking and free its computer
pub async fn complete_rental(
    data: web::Data<AppState>,
    admin: AdminIdentity,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    admin.require_desk()?;
    let rental_id = path.into_inner();

    let computer_id = data
        .store
        .write(|conn| rentals::complete_rental(conn, rental_id, admin.admin_id))
        .await?;
    info!("Rental {} completed, computer {} released", rental_id, computer_id);

    Ok(HttpResponse::Ok().json(GenericResponse::ok(
        "Rental completed successfully",
        json!({ "rental_id": rental_id, "computer_id": computer_id }),
    )))
}
