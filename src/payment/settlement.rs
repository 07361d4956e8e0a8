//! Payment confirmation.
//!
//! A gateway status is written onto the stored transaction. The first time a
//! transaction reaches `settlement`, the side effects of its type are applied
//! in the same SQL transaction as the status change:
//!
//! * `Top-Up`: credit the wallet by the stored amount
//! * `Rental Payment`: record the rental carried in the metadata
//! * `Service Payment`: deduct stock for the services carried in the metadata
//!
//! The money has left the customer by the time a settlement arrives, so the
//! status is always kept. When the rental or services can no longer be
//! delivered (the computer was taken or stock ran out meanwhile), their writes
//! are undone through a savepoint and the amount is credited to the wallet.
//!
//! Later reports of `settlement` for the same order change nothing.

use log::{info, warn};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::core::error::AppError;
use crate::payment::{TransactionStatus, TransactionType};
use crate::store::rentals::{self, RentalBooking};
use crate::store::services::{self, ServiceLine};
use crate::store::transactions::{self, TransactionRecord};
use crate::store::{accounts, activity, with_savepoint};

/// Metadata of a pending service purchase
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServicePurchase {
    pub services: Vec<ServiceLine>,
}

/// Result of applying a gateway status
#[derive(Debug, Clone, PartialEq)]
pub enum SettlementOutcome {
    /// Status written, no side effects
    StatusUpdated(TransactionStatus),
    /// Wallet credited by the amount
    WalletCredited { customer_id: i64, amount: i64 },
    /// Rental written to history
    RentalRecorded { rental_history_id: i64 },
    /// Service stock deducted
    ServicesDelivered { lines: usize },
    /// Paid but undeliverable; amount credited to the wallet instead
    RefundedToWallet { customer_id: i64, amount: i64, reason: String },
    /// Already settled before; nothing changed
    AlreadySettled,
}

impl SettlementOutcome {
    /// True when this call moved the transaction into settlement
    pub fn newly_settled(&self) -> bool {
        matches!(
            self,
            SettlementOutcome::WalletCredited { .. }
                | SettlementOutcome::RentalRecorded { .. }
                | SettlementOutcome::ServicesDelivered { .. }
                | SettlementOutcome::RefundedToWallet { .. }
        )
    }
}

/// Load a transaction by gateway order id
pub fn load(conn: &Connection, order_id: &str) -> Result<TransactionRecord, AppError> {
    transactions::find_by_order(conn, order_id)?
        .ok_or_else(|| AppError::NotFound(format!("Transaction {} not found", order_id)))
}

/// Write `status` onto the order and settle it when due
pub fn apply_status(
    conn: &Connection,
    order_id: &str,
    status: &TransactionStatus,
) -> Result<SettlementOutcome, AppError> {
    let record = load(conn, order_id)?;

    if record.status.is_settled() {
        if !status.is_settled() {
            warn!("Order {} reported as {} after settlement; ignoring", order_id, status);
        }
        return Ok(SettlementOutcome::AlreadySettled);
    }

    transactions::update_status(conn, order_id, status)?;

    if !status.is_settled() {
        return Ok(SettlementOutcome::StatusUpdated(status.clone()));
    }

    info!("Settling {} order {}", record.transaction_type.as_str(), order_id);
    match record.transaction_type {
        TransactionType::TopUp => {
            accounts::credit_wallet(conn, record.customer_id, record.amount)?;
            activity::record(
                conn,
                &format!(
                    "Customer {} topped up wallet by {} (order {})",
                    record.customer_id, record.amount, order_id
                ),
            )?;
            Ok(SettlementOutcome::WalletCredited {
                customer_id: record.customer_id,
                amount: record.amount,
            })
        }
        TransactionType::RentalPayment => {
            let booking: RentalBooking = decode_metadata(&record)?;
            let delivered = with_savepoint(conn, "settle_rental", |conn| {
                rentals::record_rental(conn, &booking)
            });
            match delivered {
                Ok(rental_history_id) => Ok(SettlementOutcome::RentalRecorded { rental_history_id }),
                Err(AppError::Conflict(reason)) => refund(conn, &record, order_id, reason),
                Err(e) => Err(e),
            }
        }
        TransactionType::ServicePayment => {
            let purchase: ServicePurchase = decode_metadata(&record)?;
            let lines = services::merge_lines(&purchase.services)?;
            let delivered = with_savepoint(conn, "settle_services", |conn| {
                services::apply_lines(conn, None, record.customer_id, &lines)
            });
            match delivered {
                Ok(()) => Ok(SettlementOutcome::ServicesDelivered { lines: lines.len() }),
                Err(AppError::Conflict(reason)) => refund(conn, &record, order_id, reason),
                Err(e) => Err(e),
            }
        }
    }
}

fn refund(
    conn: &Connection,
    record: &TransactionRecord,
    order_id: &str,
    reason: String,
) -> Result<SettlementOutcome, AppError> {
    warn!(
        "Order {} settled but cannot be delivered ({}); refunding {} to customer {}",
        order_id, reason, record.amount, record.customer_id
    );
    accounts::credit_wallet(conn, record.customer_id, record.amount)?;
    activity::record(
        conn,
        &format!(
            "Customer {} refunded {} to wallet for order {}: {}",
            record.customer_id, record.amount, order_id, reason
        ),
    )?;
    Ok(SettlementOutcome::RefundedToWallet {
        customer_id: record.customer_id,
        amount: record.amount,
        reason,
    })
}

fn decode_metadata<T: for<'de> Deserialize<'de>>(record: &TransactionRecord) -> Result<T, AppError> {
    let metadata = record.metadata.clone().ok_or_else(|| {
        AppError::internal(format!("Transaction {} has no metadata", record.id))
    })?;
    serde_json::from_value(metadata).map_err(|e| {
        AppError::internal(format!("Invalid metadata on transaction {}: {}", record.id, e))
    })
}
