use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use crate::core::error::AppError;

/// A rentable computer
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Computer {
    pub id: i64,
    pub name: String,
    pub specs: String,
    pub hourly_rate: i64,
    pub is_available: bool,
}

/// An additional service sold at the desk
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Service {
    pub id: i64,
    pub name: String,
    pub price: i64,
    pub quantity: i64,
}

pub fn insert_computer(
    conn: &Connection,
    name: &str,
    specs: &str,
    hourly_rate: i64,
) -> Result<i64, AppError> {
    if hourly_rate <= 0 {
        return Err(AppError::bad_request("Hourly rate must be greater than zero"));
    }
    conn.execute(
        "INSERT INTO computer (name, specs, hourly_rate) VALUES (?1, ?2, ?3)",
        params![name, specs, hourly_rate],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn list_computers(conn: &Connection, only_available: bool) -> Result<Vec<Computer>, AppError> {
    let mut stmt = conn.prepare(
        "SELECT id, name, specs, hourly_rate, is_available FROM computer
         WHERE (?1 = 0 OR is_available = 1) ORDER BY id",
    )?;
    let rows = stmt.query_map(params![only_available], |row| {
        Ok(Computer {
            id: row.get(0)?,
            name: row.get(1)?,
            specs: row.get(2)?,
            hourly_rate: row.get(3)?,
            is_available: row.get(4)?,
        })
    })?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

/// Hourly rate of a computer that is currently free
pub fn available_rate(conn: &Connection, computer_id: i64) -> Result<i64, AppError> {
    conn.query_row(
        "SELECT hourly_rate FROM computer WHERE id = ?1 AND is_available = 1",
        params![computer_id],
        |row| row.get(0),
    )
    .optional()?
    .ok_or_else(|| AppError::bad_request("Computer not available"))
}

pub fn set_availability(conn: &Connection, computer_id: i64, available: bool) -> Result<(), AppError> {
    let updated = conn.execute(
        "UPDATE computer SET is_available = ?1 WHERE id = ?2",
        params![available, computer_id],
    )?;
    if updated == 0 {
        return Err(AppError::NotFound(format!("Computer {} not found", computer_id)));
    }
    Ok(())
}

pub fn insert_service(conn: &Connection, name: &str, price: i64, quantity: i64) -> Result<i64, AppError> {
    if price < 0 || quantity < 0 {
        return Err(AppError::bad_request("Price and quantity must not be negative"));
    }
    conn.execute(
        "INSERT INTO service (name, price, quantity) VALUES (?1, ?2, ?3)",
        params![name, price, quantity],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn list_services(conn: &Connection) -> Result<Vec<Service>, AppError> {
    let mut stmt = conn.prepare("SELECT id, name, price, quantity FROM service ORDER BY id")?;
    let rows = stmt.query_map(params![], service_from_row)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

pub fn find_service(conn: &Connection, service_id: i64) -> Result<Option<Service>, AppError> {
    let found = conn
        .query_row(
            "SELECT id, name, price, quantity FROM service WHERE id = ?1",
            params![service_id],
            service_from_row,
        )
        .optional()?;
    Ok(found)
}

/// Take `quantity` units out of stock; fails when stock would go negative
pub fn take_stock(conn: &Connection, service_id: i64, quantity: i64) -> Result<(), AppError> {
    let updated = conn.execute(
        "UPDATE service SET quantity = quantity - ?1 WHERE id = ?2 AND quantity >= ?1",
        params![quantity, service_id],
    )?;
    if updated == 0 {
        return Err(AppError::Conflict(format!(
            "Insufficient stock for service ID {}",
            service_id
        )));
    }
    Ok(())
}

fn service_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Service> {
    Ok(Service {
        id: row.get(0)?,
        name: row.get(1)?,
        price: row.get(2)?,
        quantity: row.get(3)?,
    })
}
