use chrono::{DateTime, Utc};
use log::info;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::core::error::AppError;
use crate::core::pricing;
use crate::store::services::{self, PricedLine, ServiceLine};
use crate::store::{activity, catalog, parse_timestamp, timestamp};

pub const STATUS_SETTLEMENT: &str = "settlement";
pub const STATUS_COMPLETED: &str = "completed";

/// Price breakdown of a rental before it is paid
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RentalQuote {
    pub hourly_rate: i64,
    pub billable_hours: i64,
    pub rental_cost: i64,
    pub services: Vec<PricedLine>,
    pub services_cost: i64,
    pub total_cost: i64,
}

/// Everything needed to write a paid rental.
///
/// Stored as JSON metadata on pending gateway transactions, so the rental can
/// be recorded once the payment settles.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RentalBooking {
    pub customer_id: i64,
    pub computer_id: i64,
    pub admin_id: i64,
    pub rental_start: DateTime<Utc>,
    pub rental_end: DateTime<Utc>,
    pub total_cost: i64,
    #[serde(default)]
    pub activity_description: String,
    #[serde(default)]
    pub services: Vec<ServiceLine>,
}

/// One row of a customer's booking report
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BookingReport {
    pub rental_id: i64,
    pub computer_id: i64,
    pub computer_name: Option<String>,
    pub admin_id: i64,
    pub admin_username: Option<String>,
    pub rental_start: DateTime<Utc>,
    pub rental_end: DateTime<Utc>,
    pub total_cost: i64,
    pub booking_status: String,
}

/// Price a rental of a free computer plus any services
pub fn quote(
    conn: &Connection,
    computer_id: i64,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    lines: &[ServiceLine],
) -> Result<RentalQuote, AppError> {
    let hourly_rate = catalog::available_rate(conn, computer_id)?;
    let billable_hours = pricing::billable_hours(start, end)?;
    let rental_cost = pricing::rental_cost(billable_hours, hourly_rate)?;

    let priced = services::quote_lines(conn, lines)?;
    let services_cost = pricing::total(priced.iter().map(|line| line.cost))?;
    let total_cost = pricing::total([rental_cost, services_cost])?;

    Ok(RentalQuote {
        hourly_rate,
        billable_hours,
        rental_cost,
        services: priced,
        services_cost,
        total_cost,
    })
}

/// Write a paid rental: history row, activity log, services, and lock the computer
pub fn record_rental(conn: &Connection, booking: &RentalBooking) -> Result<i64, AppError> {
    // Availability may have changed since the quote
    catalog::available_rate(conn, booking.computer_id).map_err(|e| match e {
        AppError::BadRequest(_) => {
            AppError::Conflict(format!("Computer {} is no longer available", booking.computer_id))
        }
        other => other,
    })?;

    conn.execute(
        "INSERT INTO rental_history
            (customer_id, computer_id, admin_id, rental_start_time, rental_end_time, total_cost, booking_status)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            booking.customer_id,
            booking.computer_id,
            booking.admin_id,
            timestamp(&booking.rental_start),
            timestamp(&booking.rental_end),
            booking.total_cost,
            STATUS_SETTLEMENT
        ],
    )?;
    let rental_id = conn.last_insert_rowid();

    activity::record_session(
        conn,
        booking.customer_id,
        booking.computer_id,
        &booking.rental_start,
        &booking.rental_end,
        &booking.activity_description,
    )?;

    if !booking.services.is_empty() {
        services::apply_lines(conn, Some(rental_id), booking.customer_id, &booking.services)?;
    }

    catalog::set_availability(conn, booking.computer_id, false)?;

    info!(
        "Recorded rental {} for customer {} on computer {}",
        rental_id, booking.customer_id, booking.computer_id
    );
    Ok(rental_id)
}

/// Close a rental and release its computer
pub fn complete_rental(conn: &Connection, rental_id: i64, admin_id: i64) -> Result<i64, AppError> {
    let (computer_id, status): (i64, String) = conn
        .query_row(
            "SELECT computer_id, booking_status FROM rental_history WHERE id = ?1",
            params![rental_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?
        .ok_or_else(|| AppError::NotFound(format!("Rental {} not found", rental_id)))?;

    if status == STATUS_COMPLETED {
        return Err(AppError::Conflict(format!("Rental {} is already completed", rental_id)));
    }

    conn.execute(
        "UPDATE rental_history SET booking_status = ?1 WHERE id = ?2",
        params![STATUS_COMPLETED, rental_id],
    )?;
    catalog::set_availability(conn, computer_id, true)?;
    activity::record(
        conn,
        &format!(
            "Admin {} completed rental {} and released Computer {}",
            admin_id, rental_id, computer_id
        ),
    )?;

    Ok(computer_id)
}

/// Rentals of a customer, newest first; `recent` keeps only the latest
pub fn booking_report(
    conn: &Connection,
    customer_id: i64,
    recent: bool,
) -> Result<Vec<BookingReport>, AppError> {
    let mut sql = String::from(
        "SELECT rh.id, rh.computer_id, c.name, rh.admin_id, a.username,
                rh.rental_start_time, rh.rental_end_time, rh.total_cost, rh.booking_status
         FROM rental_history rh
         LEFT JOIN computer c ON rh.computer_id = c.id
         LEFT JOIN admin a ON rh.admin_id = a.id
         WHERE rh.customer_id = ?1
         ORDER BY rh.rental_start_time DESC, rh.id DESC",
    );
    if recent {
        sql.push_str(" LIMIT 1");
    }

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![customer_id], |row| {
        let start: String = row.get(5)?;
        let end: String = row.get(6)?;
        Ok(BookingReport {
            rental_id: row.get(0)?,
            computer_id: row.get(1)?,
            computer_name: row.get(2)?,
            admin_id: row.get(3)?,
            admin_username: row.get(4)?,
            rental_start: parse_timestamp(5, &start)?,
            rental_end: parse_timestamp(6, &end)?,
            total_cost: row.get(7)?,
            booking_status: row.get(8)?,
        })
    })?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}
