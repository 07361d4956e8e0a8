use std::collections::BTreeMap;

use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

use crate::core::error::AppError;
use crate::core::pricing;
use crate::store::{activity, catalog};

/// Requested quantity of one service
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceLine {
    pub service_id: i64,
    pub quantity: i64,
}

/// A service line with its price resolved
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PricedLine {
    pub service_id: i64,
    pub name: String,
    pub price: i64,
    pub quantity: i64,
    pub cost: i64,
}

/// Collapse repeated service ids into one line each
pub fn merge_lines(lines: &[ServiceLine]) -> Result<Vec<ServiceLine>, AppError> {
    let mut merged: BTreeMap<i64, i64> = BTreeMap::new();
    for line in lines {
        let quantity = merged.entry(line.service_id).or_insert(0);
        *quantity = quantity.checked_add(line.quantity).ok_or_else(|| {
            AppError::bad_request(format!("Quantity for service ID {} is too large", line.service_id))
        })?;
    }
    Ok(merged
        .into_iter()
        .map(|(service_id, quantity)| ServiceLine { service_id, quantity })
        .collect())
}

/// Price every line and check it against current stock
pub fn quote_lines(conn: &Connection, lines: &[ServiceLine]) -> Result<Vec<PricedLine>, AppError> {
    let mut priced = Vec::with_capacity(lines.len());

    for line in merge_lines(lines)? {
        if line.quantity <= 0 {
            return Err(AppError::bad_request(format!(
                "Quantity for service ID {} must be greater than zero",
                line.service_id
            )));
        }

        let service = catalog::find_service(conn, line.service_id)?.ok_or_else(|| {
            AppError::bad_request(format!("Invalid service ID {}", line.service_id))
        })?;

        if line.quantity > service.quantity {
            return Err(AppError::bad_request(format!(
                "Insufficient stock for service ID {}. Available: {}",
                service.id, service.quantity
            )));
        }

        priced.push(PricedLine {
            service_id: service.id,
            cost: pricing::line_cost(service.price, line.quantity)?,
            name: service.name,
            price: service.price,
            quantity: line.quantity,
        });
    }

    Ok(priced)
}

/// Deduct stock and record each line, optionally against a rental
pub fn apply_lines(
    conn: &Connection,
    rental_history_id: Option<i64>,
    customer_id: i64,
    lines: &[ServiceLine],
) -> Result<(), AppError> {
    for line in merge_lines(lines)? {
        catalog::take_stock(conn, line.service_id, line.quantity)?;

        conn.execute(
            "INSERT INTO rental_services (rental_history_id, service_id, quantity) VALUES (?1, ?2, ?3)",
            params![rental_history_id, line.service_id, line.quantity],
        )?;

        activity::record(
            conn,
            &format!(
                "Customer {} purchased Service ID {} (Quantity: {})",
                customer_id, line.service_id, line.quantity
            ),
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{fixtures, Store};

    #[test]
    fn test_merge_lines() {
        let merged = merge_lines(&[
            ServiceLine { service_id: 2, quantity: 1 },
            ServiceLine { service_id: 1, quantity: 2 },
            ServiceLine { service_id: 2, quantity: 3 },
        ])
        .unwrap();
        assert_eq!(
            merged,
            vec![
                ServiceLine { service_id: 1, quantity: 2 },
                ServiceLine { service_id: 2, quantity: 4 },
            ]
        );
    }

    // Test quantities that overflow when merged are rejected, not wrapped
    #[tokio::test]
    async fn test_merge_overflow_is_rejected() {
        let lines = [
            ServiceLine { service_id: 1, quantity: i64::MAX },
            ServiceLine { service_id: 1, quantity: 1 },
        ];
        assert!(matches!(merge_lines(&lines), Err(AppError::BadRequest(_))));

        let store = Store::open_in_memory().unwrap();
        let result = store
            .write(|conn| {
                fixtures::service(conn, "Headset", 10_000, 3);
                quote_lines(conn, &lines)
            })
            .await;
        match result {
            Err(AppError::BadRequest(msg)) => assert_eq!(msg, "Quantity for service ID 1 is too large"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    // Test merged quantities are checked against stock together
    #[tokio::test]
    async fn test_quote_checks_merged_stock() {
        let store = Store::open_in_memory().unwrap();
        let result = store
            .write(|conn| {
                let id = fixtures::service(conn, "Headset", 10_000, 3);
                quote_lines(
                    conn,
                    &[
                        ServiceLine { service_id: id, quantity: 2 },
                        ServiceLine { service_id: id, quantity: 2 },
                    ],
                )
            })
            .await;
        match result {
            Err(AppError::BadRequest(msg)) => {
                assert_eq!(msg, "Insufficient stock for service ID 1. Available: 3")
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_quote_and_apply() {
        let store = Store::open_in_memory().unwrap();
        store
            .write(|conn| {
                let customer = fixtures::customer(conn, "c@example.com", 0);
                let drink = fixtures::service(conn, "Drink", 8_000, 10);
                let lines = [ServiceLine { service_id: drink, quantity: 3 }];

                let quote = quote_lines(conn, &lines)?;
                assert_eq!(quote[0].cost, 24_000);
                assert_eq!(quote[0].name, "Drink");

                apply_lines(conn, None, customer, &lines)?;
                assert_eq!(catalog::find_service(conn, drink)?.unwrap().quantity, 7);
                assert_eq!(fixtures::count(conn, "rental_services"), 1);
                assert!(quote_lines(conn, &[ServiceLine { service_id: 99, quantity: 1 }]).is_err());
                Ok(())
            })
            .await
            .unwrap();
    }
}
