//! Rental and service cost arithmetic.
//!
//! Amounts are whole IDR. A rental is billed per started-and-finished hour:
//! the span between start and end is truncated to whole hours.

use chrono::{DateTime, Utc};

use crate::core::error::AppError;

/// Whole hours between `start` and `end`, truncated
pub fn billable_hours(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<i64, AppError> {
    if end <= start {
        return Err(AppError::bad_request("Rental end must be after rental start"));
    }

    let hours = (end - start).num_hours();
    if hours < 1 {
        return Err(AppError::bad_request("Rental must last at least one hour"));
    }

    Ok(hours)
}

/// Duration in fractional hours, reported back to the caller
pub fn duration_hours(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    (end - start).num_seconds() as f64 / 3600.0
}

pub fn rental_cost(hours: i64, hourly_rate: i64) -> Result<i64, AppError> {
    hours
        .checked_mul(hourly_rate)
        .ok_or_else(|| AppError::bad_request("Rental cost is out of range"))
}

pub fn line_cost(price: i64, quantity: i64) -> Result<i64, AppError> {
    if quantity <= 0 {
        return Err(AppError::bad_request("Service quantity must be greater than zero"));
    }
    price
        .checked_mul(quantity)
        .ok_or_else(|| AppError::bad_request("Service cost is out of range"))
}

/// Sum of costs, failing on overflow
pub fn total<I: IntoIterator<Item = i64>>(costs: I) -> Result<i64, AppError> {
    costs.into_iter().try_fold(0i64, |acc, cost| {
        acc.checked_add(cost)
            .ok_or_else(|| AppError::bad_request("Total cost is out of range"))
    })
}
