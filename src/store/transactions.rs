use rusqlite::{params, Connection, OptionalExtension};

use crate::core::error::AppError;
use crate::payment::{PaymentMethod, TransactionStatus, TransactionType};

/// A stored payment transaction
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionRecord {
    pub id: i64,
    pub customer_id: i64,
    pub transaction_type: TransactionType,
    pub amount: i64,
    pub transaction_method: String,
    pub status: TransactionStatus,
    pub payment_url: Option<String>,
    pub order_id: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

/// A gateway charge awaiting settlement
#[derive(Debug, Clone)]
pub struct PendingCharge<'a> {
    pub customer_id: i64,
    pub transaction_type: TransactionType,
    pub amount: i64,
    pub payment_url: &'a str,
    pub order_id: &'a str,
    pub metadata: Option<serde_json::Value>,
}

/// Record a wallet payment, settled on the spot
pub fn insert_wallet_payment(
    conn: &Connection,
    customer_id: i64,
    transaction_type: TransactionType,
    amount: i64,
) -> Result<i64, AppError> {
    conn.execute(
        "INSERT INTO transactions (customer_id, transaction_type, amount, transaction_method, status)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            customer_id,
            transaction_type.as_str(),
            amount,
            PaymentMethod::Wallet.label(),
            TransactionStatus::Settlement.as_str()
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Record a GoPay charge as pending
pub fn insert_pending(conn: &Connection, charge: &PendingCharge<'_>) -> Result<i64, AppError> {
    let metadata = charge
        .metadata
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;

    conn.execute(
        "INSERT INTO transactions
            (customer_id, transaction_type, amount, transaction_method, status, payment_url, order_id, metadata)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            charge.customer_id,
            charge.transaction_type.as_str(),
            charge.amount,
            PaymentMethod::Gopay.label(),
            TransactionStatus::Pending.as_str(),
            charge.payment_url,
            charge.order_id,
            metadata
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn find_by_order(conn: &Connection, order_id: &str) -> Result<Option<TransactionRecord>, AppError> {
    let row = conn
        .query_row(
            "SELECT id, customer_id, transaction_type, amount, transaction_method, status,
                    payment_url, order_id, metadata
             FROM transactions WHERE order_id = ?1",
            params![order_id],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, Option<String>>(6)?,
                    row.get::<_, Option<String>>(7)?,
                    row.get::<_, Option<String>>(8)?,
                ))
            },
        )
        .optional()?;

    let Some((id, customer_id, kind, amount, method, status, payment_url, order_id, metadata)) = row
    else {
        return Ok(None);
    };

    let transaction_type = TransactionType::parse(&kind)
        .ok_or_else(|| AppError::internal(format!("Unknown transaction type '{}'", kind)))?;
    let metadata = metadata
        .map(|raw| serde_json::from_str::<serde_json::Value>(&raw))
        .transpose()?;

    Ok(Some(TransactionRecord {
        id,
        customer_id,
        transaction_type,
        amount,
        transaction_method: method,
        status: TransactionStatus::from(status),
        payment_url,
        order_id,
        metadata,
    }))
}

pub fn update_status(conn: &Connection, order_id: &str, status: &TransactionStatus) -> Result<(), AppError> {
    let updated = conn.execute(
        "UPDATE transactions SET status = ?1 WHERE order_id = ?2",
        params![status.as_str(), order_id],
    )?;
    if updated == 0 {
        return Err(AppError::NotFound(format!("Transaction {} not found", order_id)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{fixtures, Store};
    use serde_json::json;

    // Test a pending charge round trips with its metadata
    #[tokio::test]
    async fn test_pending_charge() {
        let store = Store::open_in_memory().unwrap();
        let found = store
            .write(|conn| {
                let customer = fixtures::customer(conn, "a@example.com", 0);
                insert_pending(
                    conn,
                    &PendingCharge {
                        customer_id: customer,
                        transaction_type: TransactionType::ServicePayment,
                        amount: 16_000,
                        payment_url: "https://pay.example/qr",
                        order_id: "service-1-1-deadbeef",
                        metadata: Some(json!({ "services": [] })),
                    },
                )?;
                update_status(conn, "service-1-1-deadbeef", &TransactionStatus::Expire)?;
                find_by_order(conn, "service-1-1-deadbeef")
            })
            .await
            .unwrap()
            .unwrap();

        assert_eq!(found.transaction_type, TransactionType::ServicePayment);
        assert_eq!(found.status, TransactionStatus::Expire);
        assert_eq!(found.transaction_method, "GoPay");
        assert_eq!(found.metadata, Some(json!({ "services": [] })));
    }

    #[tokio::test]
    async fn test_unknown_order() {
        let store = Store::open_in_memory().unwrap();
        let result = store
            .write(|conn| {
                assert!(find_by_order(conn, "missing")?.is_none());
                update_status(conn, "missing", &TransactionStatus::Settlement)
            })
            .await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_wallet_payment_is_settled() {
        let store = Store::open_in_memory().unwrap();
        let status: String = store
            .write(|conn| {
                let customer = fixtures::customer(conn, "a@example.com", 0);
                let id = insert_wallet_payment(conn, customer, TransactionType::RentalPayment, 10_000)?;
                Ok(conn.query_row(
                    "SELECT status FROM transactions WHERE id = ?1",
                    params![id],
                    |row| row.get(0),
                )?)
            })
            .await
            .unwrap();
        assert_eq!(status, "settlement");
    }
}
