use chrono::{DateTime, Utc};
use log::debug;
use rusqlite::{params, Connection};

use crate::core::error::AppError;
use crate::store::timestamp;

/// Append a free-text entry to the activity log
pub fn record(conn: &Connection, description: &str) -> Result<(), AppError> {
    debug!("activity: {}", description);
    conn.execute("INSERT INTO log (description) VALUES (?1)", params![description])?;
    Ok(())
}

/// Append a structured rental session entry
pub fn record_session(
    conn: &Connection,
    customer_id: i64,
    computer_id: i64,
    start: &DateTime<Utc>,
    end: &DateTime<Utc>,
    activity_description: &str,
) -> Result<(), AppError> {
    let description = format!(
        "Rental payment completed for Customer {}, with Computer {} from {} to {}. Activity: {}",
        customer_id,
        computer_id,
        timestamp(start),
        timestamp(end),
        activity_description
    );
    debug!("activity: {}", description);

    conn.execute(
        "INSERT INTO log (description, customer_id, computer_id, login_time, logout_time, activity_description)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            description,
            customer_id,
            computer_id,
            timestamp(start),
            timestamp(end),
            activity_description
        ],
    )?;
    Ok(())
}

/// Most recent descriptions, newest first
pub fn recent(conn: &Connection, limit: i64) -> Result<Vec<String>, AppError> {
    let mut stmt = conn.prepare("SELECT description FROM log ORDER BY id DESC LIMIT ?1")?;
    let rows = stmt.query_map(params![limit], |row| row.get::<_, Option<String>>(0))?;

    let mut descriptions = Vec::new();
    for row in rows {
        if let Some(description) = row? {
            descriptions.push(description);
        }
    }
    Ok(descriptions)
}
