use rusqlite::{params, Connection, OptionalExtension};

use crate::core::auth::AdminRole;
use crate::core::error::AppError;
use crate::store::unique_violation;

/// Credentials row used by customer login
#[derive(Debug, Clone)]
pub struct CustomerCredentials {
    pub id: i64,
    pub email: String,
    pub password_hash: String,
}

/// Credentials row used by admin login
#[derive(Debug, Clone)]
pub struct AdminCredentials {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    pub role: AdminRole,
}

pub fn insert_customer(
    conn: &Connection,
    name: &str,
    username: &str,
    email: &str,
    password_hash: &str,
) -> Result<i64, AppError> {
    conn.execute(
        "INSERT INTO customer (name, username, email, password) VALUES (?1, ?2, ?3, ?4)",
        params![name, username, email, password_hash],
    )
    .map_err(|e| match unique_violation(&e) {
        Some("customer.username") => AppError::bad_request("Username already registered"),
        Some(_) => AppError::bad_request("Email already registered"),
        None => AppError::Database(e),
    })?;
    Ok(conn.last_insert_rowid())
}

pub fn insert_admin(
    conn: &Connection,
    username: &str,
    password_hash: &str,
    role: AdminRole,
) -> Result<i64, AppError> {
    conn.execute(
        "INSERT INTO admin (username, password, role) VALUES (?1, ?2, ?3)",
        params![username, password_hash, role.as_str()],
    )
    .map_err(|e| match unique_violation(&e) {
        Some(_) => AppError::bad_request("Username already registered"),
        None => AppError::Database(e),
    })?;
    Ok(conn.last_insert_rowid())
}

pub fn find_customer_by_email(
    conn: &Connection,
    email: &str,
) -> Result<Option<CustomerCredentials>, AppError> {
    let found = conn
        .query_row(
            "SELECT id, email, password FROM customer WHERE email = ?1",
            params![email],
            |row| {
                Ok(CustomerCredentials {
                    id: row.get(0)?,
                    email: row.get(1)?,
                    password_hash: row.get(2)?,
                })
            },
        )
        .optional()?;
    Ok(found)
}

pub fn find_admin_by_username(
    conn: &Connection,
    username: &str,
) -> Result<Option<AdminCredentials>, AppError> {
    let found = conn
        .query_row(
            "SELECT id, username, password, role FROM admin WHERE username = ?1",
            params![username],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get::<_, String>(3)?)),
        )
        .optional()?;

    match found {
        Some((id, username, password_hash, role)) => Ok(Some(AdminCredentials {
            id,
            username,
            password_hash,
            role: role.parse()?,
        })),
        None => Ok(None),
    }
}

/// Remember the most recently issued token for a customer
pub fn save_customer_token(conn: &Connection, customer_id: i64, token: &str) -> Result<(), AppError> {
    conn.execute(
        "UPDATE customer SET jwt_token = ?1, updated_at = CURRENT_TIMESTAMP WHERE id = ?2",
        params![token, customer_id],
    )?;
    Ok(())
}

pub fn save_admin_token(conn: &Connection, admin_id: i64, token: &str) -> Result<(), AppError> {
    conn.execute(
        "UPDATE admin SET jwt_token = ?1, updated_at = CURRENT_TIMESTAMP WHERE id = ?2",
        params![token, admin_id],
    )?;
    Ok(())
}

/// Wallet balance; `NotFound` for an unknown customer
pub fn wallet_balance(conn: &Connection, customer_id: i64) -> Result<i64, AppError> {
    conn.query_row(
        "SELECT wallet FROM customer WHERE id = ?1",
        params![customer_id],
        |row| row.get(0),
    )
    .optional()?
    .ok_or_else(|| AppError::NotFound(format!("Customer {} not found", customer_id)))
}

pub fn ensure_customer(conn: &Connection, customer_id: i64) -> Result<(), AppError> {
    wallet_balance(conn, customer_id).map(|_| ())
}

pub fn credit_wallet(conn: &Connection, customer_id: i64, amount: i64) -> Result<(), AppError> {
    let updated = conn.execute(
        "UPDATE customer SET wallet = wallet + ?1, updated_at = CURRENT_TIMESTAMP WHERE id = ?2",
        params![amount, customer_id],
    )?;
    if updated == 0 {
        return Err(AppError::NotFound(format!("Customer {} not found", customer_id)));
    }
    Ok(())
}

/// Deduct from the wallet, refusing to go below zero
pub fn debit_wallet(conn: &Connection, customer_id: i64, amount: i64) -> Result<(), AppError> {
    let balance = wallet_balance(conn, customer_id)?;
    if balance < amount {
        return Err(AppError::bad_request("Insufficient wallet balance"));
    }

    conn.execute(
        "UPDATE customer SET wallet = wallet - ?1, updated_at = CURRENT_TIMESTAMP WHERE id = ?2",
        params![amount, customer_id],
    )?;
    Ok(())
}
