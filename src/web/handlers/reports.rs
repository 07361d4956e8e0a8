//! Booking and revenue reporting.

use actix_web::{web, HttpResponse};
use chrono::NaiveDate;
use log::info;

use crate::core::error::AppError;
use crate::store::{activity, rentals, reports};
use crate::web::auth::{AdminIdentity, CustomerIdentity};
use crate::web::models::{BookingReportQuery, GenericResponse, RevenueReportRequest};
use crate::web::server::AppState;

/// Rentals of the calling customer
pub async fn booking_report(
    data: web::Data<AppState>,
    identity: CustomerIdentity,
    query: web::Query<BookingReportQuery>,
) -> Result<HttpResponse, AppError> {
    let rows = data
        .store
        .read(|conn| rentals::booking_report(conn, identity.customer_id, query.only_recent()))
        .await?;

    Ok(HttpResponse::Ok().json(GenericResponse::ok(
        "Booking report retrieved successfully",
        serde_json::to_value(rows)?,
    )))
}

/// Revenue over a date range; stored as a report row
pub async fn revenue_report(
    data: web::Data<AppState>,
    admin: AdminIdentity,
    request: web::Json<RevenueReportRequest>,
) -> Result<HttpResponse, AppError> {
    admin.require_super_admin()?;
    let start = parse_date("start_date", &request.start_date)?;
    let end = parse_date("end_date", &request.end_date)?;

    let summary = data
        .store
        .write(|conn| {
            let summary = reports::revenue_summary(conn, start, end)?;
            reports::save_report(conn, admin.admin_id, start, end, &summary)?;
            activity::record(
                conn,
                &format!(
                    "Admin {} generated {} from {} to {}",
                    admin.admin_id,
                    reports::REVENUE_REPORT,
                    start,
                    end
                ),
            )?;
            Ok(summary)
        })
        .await?;
    info!(
        "Revenue report {}..{}: {} over {} transactions",
        start, end, summary.total_revenue, summary.total_transactions
    );

    Ok(HttpResponse::Ok().json(GenericResponse::ok(
        "Revenue report generated successfully",
        serde_json::to_value(summary)?,
    )))
}

fn parse_date(field: &str, raw: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| AppError::bad_request(format!("Invalid {}, expected YYYY-MM-DD", field)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::auth::AdminRole;
    use crate::payment::{MockPaymentGateway, TransactionType};
    use crate::store::rentals::RentalBooking;
    use crate::store::{fixtures, transactions};
    use crate::web::handlers::testing::{bearer, seed};
    use crate::web::server::{configure, test_state};
    use actix_web::http::StatusCode;
    use actix_web::{test as actix_test, App};
    use chrono::{Duration, TimeZone, Utc};
    use serde_json::{json, Value};

    #[test]
    fn test_parse_date() {
        assert!(parse_date("start_date", "2024-05-01").is_ok());
        assert!(parse_date("start_date", "01/05/2024").is_err());
    }

    // Test the booking report lists rentals newest first, or only the latest
    #[actix_web::test]
    async fn test_booking_report() {
        let state = test_state(MockPaymentGateway::new());
        let customer = seed(&state, |conn| {
            let customer = fixtures::customer(conn, "ana@example.com", 0);
            let admin = fixtures::admin(conn, "desk", AdminRole::Admin);
            let start = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
            for day in 0..2 {
                let computer = fixtures::computer(conn, 10_000);
                let rental_start = start + Duration::days(day);
                rentals::record_rental(
                    conn,
                    &RentalBooking {
                        customer_id: customer,
                        computer_id: computer,
                        admin_id: admin,
                        rental_start,
                        rental_end: rental_start + Duration::hours(1),
                        total_cost: 10_000,
                        activity_description: String::new(),
                        services: vec![],
                    },
                )
                .unwrap();
            }
            customer
        })
        .await;
        let token = state.tokens.issue_customer(customer).unwrap();
        let app = actix_test::init_service(App::new().app_data(state).configure(configure)).await;

        let req = actix_test::TestRequest::get()
            .uri("/customer/booking/report")
            .insert_header(bearer(&token))
            .to_request();
        let body: GenericResponse = actix_test::call_and_read_body_json(&app, req).await;
        assert_eq!(body.message, "Booking report retrieved successfully");
        let rows = body.data.unwrap();
        assert_eq!(rows.as_array().unwrap().len(), 2);
        assert_eq!(rows[0]["rental_start"], "2024-05-02T10:00:00Z");
        assert_eq!(rows[0]["admin_username"], "desk");

        let req = actix_test::TestRequest::get()
            .uri("/customer/booking/report?recent=true")
            .insert_header(bearer(&token))
            .to_request();
        let body: GenericResponse = actix_test::call_and_read_body_json(&app, req).await;
        assert_eq!(body.data.unwrap().as_array().unwrap().len(), 1);
    }

    // Test revenue reports are limited to super-admins and persisted
    #[actix_web::test]
    async fn test_revenue_report() {
        let state = test_state(MockPaymentGateway::new());
        let (admin, boss) = seed(&state, |conn| {
            let customer = fixtures::customer(conn, "ana@example.com", 0);
            transactions::insert_wallet_payment(conn, customer, TransactionType::RentalPayment, 20_000)
                .unwrap();
            (
                fixtures::admin(conn, "desk", AdminRole::Admin),
                fixtures::admin(conn, "boss", AdminRole::SuperAdmin),
            )
        })
        .await;
        let app = actix_test::init_service(App::new().app_data(state.clone()).configure(configure)).await;

        let today = Utc::now().date_naive().format("%Y-%m-%d").to_string();
        let body = json!({ "start_date": today, "end_date": today });

        let token = state.tokens.issue_admin(admin, AdminRole::Admin).unwrap();
        let req = actix_test::TestRequest::post()
            .uri("/admin/revenue-report")
            .insert_header(bearer(&token))
            .set_json(&body)
            .to_request();
        assert_eq!(actix_test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

        let token = state.tokens.issue_admin(boss, AdminRole::SuperAdmin).unwrap();
        let req = actix_test::TestRequest::post()
            .uri("/admin/revenue-report")
            .insert_header(bearer(&token))
            .set_json(&body)
            .to_request();
        let resp: Value = actix_test::call_and_read_body_json(&app, req).await;
        assert_eq!(resp["data"]["total_revenue"], 20_000);
        assert_eq!(resp["data"]["total_transactions"], 1);

        assert_eq!(seed(&state, |conn| fixtures::count(conn, "report")).await, 1);
    }
}
