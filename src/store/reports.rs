use chrono::{Duration, NaiveDate};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

use crate::core::error::AppError;
use crate::payment::TransactionStatus;

pub const REVENUE_REPORT: &str = "Revenue Report";
const TOP_SERVICES_LIMIT: i64 = 5;

/// Revenue of one service over a report window
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TopService {
    pub service_name: String,
    pub total_revenue: i64,
    pub total_sold: i64,
}

/// Totals over a report window
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RevenueSummary {
    pub total_revenue: i64,
    pub total_transactions: i64,
    pub top_services: Vec<TopService>,
}

/// Inclusive date range turned into `[from, until)` timestamp bounds
fn bounds(start: NaiveDate, end: NaiveDate) -> Result<(String, String), AppError> {
    if end < start {
        return Err(AppError::bad_request("End date must not be before start date"));
    }
    let until = end
        .checked_add_signed(Duration::days(1))
        .ok_or_else(|| AppError::bad_request("End date is out of range"))?;
    Ok((
        format!("{} 00:00:00", start.format("%Y-%m-%d")),
        format!("{} 00:00:00", until.format("%Y-%m-%d")),
    ))
}

/// Settled revenue and the best selling services between two dates
pub fn revenue_summary(
    conn: &Connection,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<RevenueSummary, AppError> {
    let (from, until) = bounds(start, end)?;

    let (total_revenue, total_transactions): (i64, i64) = conn.query_row(
        "SELECT COALESCE(SUM(amount), 0), COUNT(*)
         FROM transactions
         WHERE transaction_date >= ?1 AND transaction_date < ?2 AND LOWER(status) = ?3",
        params![from, until, TransactionStatus::Settlement.as_str()],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    let mut stmt = conn.prepare(
        "SELECT s.name, SUM(rs.quantity * s.price) AS total_revenue, SUM(rs.quantity) AS total_sold
         FROM rental_services rs
         JOIN service s ON rs.service_id = s.id
         WHERE rs.created_at >= ?1 AND rs.created_at < ?2
         GROUP BY s.id
         ORDER BY total_revenue DESC, s.id
         LIMIT ?3",
    )?;
    let rows = stmt.query_map(params![from, until, TOP_SERVICES_LIMIT], |row| {
        Ok(TopService {
            service_name: row.get(0)?,
            total_revenue: row.get(1)?,
            total_sold: row.get(2)?,
        })
    })?;
    let top_services = rows.collect::<Result<Vec<_>, _>>()?;

    Ok(RevenueSummary {
        total_revenue,
        total_transactions,
        top_services,
    })
}

/// Persist a generated report
pub fn save_report(
    conn: &Connection,
    admin_id: i64,
    start: NaiveDate,
    end: NaiveDate,
    summary: &RevenueSummary,
) -> Result<i64, AppError> {
    let top_services = serde_json::to_string(&summary.top_services)?;
    conn.execute(
        "INSERT INTO report
            (admin_id, report_type, start_date, end_date, total_transactions, total_revenue, top_services)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            admin_id,
            REVENUE_REPORT,
            start.format("%Y-%m-%d").to_string(),
            end.format("%Y-%m-%d").to_string(),
            summary.total_transactions,
            summary.total_revenue,
            top_services
        ],
    )?;
    Ok(conn.last_insert_rowid())
}
