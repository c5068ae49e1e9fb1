//! Flattening of joined fetch results into flat summary rows.
//!
//! The store returns one level of LEFT JOIN embedding, so a deleted renter,
//! product, or owner shows up as a NULL name. Every adapter here resolves
//! those holes to an explicit placeholder instead of letting them leak into
//! rendered output.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::{MaintenanceStatus, RentalStatus};

pub const UNKNOWN: &str = "Unknown";

/// Rental joined with renter name, product name, and the product owner's
/// name, as fetched. Names are NULL when the referenced row is gone.
#[derive(Debug, Clone, Deserialize, FromRow)]
pub struct RentalJoinRow {
    pub rental_id: i64,
    pub renter_name: Option<String>,
    pub product_name: Option<String>,
    pub owner_name: Option<String>,
    pub total_cost: f64,
    pub status: RentalStatus,
    pub rental_start: String,
    pub rental_end: String,
}

/// Flat renter × product × owner row for tables and the JSON API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RentalSummary {
    pub rental_id: i64,
    pub renter_name: String,
    pub product_name: String,
    pub owner_name: String,
    pub total_cost: f64,
    pub status: RentalStatus,
    pub rental_start: String,
    pub rental_end: String,
}

pub fn flatten_rental(row: &RentalJoinRow) -> RentalSummary {
    RentalSummary {
        rental_id: row.rental_id,
        renter_name: placeholder(&row.renter_name),
        product_name: placeholder(&row.product_name),
        owner_name: placeholder(&row.owner_name),
        total_cost: row.total_cost,
        status: row.status,
        rental_start: row.rental_start.clone(),
        rental_end: row.rental_end.clone(),
    }
}

pub fn flatten_rentals(rows: &[RentalJoinRow]) -> Vec<RentalSummary> {
    rows.iter().map(flatten_rental).collect()
}

#[derive(Debug, Clone, Deserialize, FromRow)]
pub struct MaintenanceJoinRow {
    pub maintenance_id: i64,
    pub product_id: i64,
    pub product_name: Option<String>,
    pub last_cleaned: String,
    pub next_cleaning_due: String,
    pub status: MaintenanceStatus,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MaintenanceSummary {
    pub maintenance_id: i64,
    pub product_name: String,
    pub last_cleaned: String,
    pub next_cleaning_due: String,
    pub status: MaintenanceStatus,
    pub schedule: &'static str,
}

pub fn flatten_maintenance(rows: &[MaintenanceJoinRow]) -> Vec<MaintenanceSummary> {
    let today = Utc::now().date_naive();
    rows.iter().map(|r| flatten_maintenance_row(r, today)).collect()
}

fn flatten_maintenance_row(row: &MaintenanceJoinRow, today: NaiveDate) -> MaintenanceSummary {
    let due = NaiveDate::parse_from_str(&row.next_cleaning_due, "%Y-%m-%d").ok();
    let schedule = match due {
        Some(due) if due < today => "Overdue",
        Some(_) => "On Schedule",
        None => UNKNOWN,
    };
    MaintenanceSummary {
        maintenance_id: row.maintenance_id,
        product_name: placeholder(&row.product_name),
        last_cleaned: row.last_cleaned.clone(),
        next_cleaning_due: row.next_cleaning_due.clone(),
        status: row.status,
        schedule,
    }
}

/// Review joined with the reviewer's display name.
#[derive(Debug, Clone, Deserialize, FromRow)]
pub struct ReviewJoinRow {
    pub review_id: i64,
    pub product_id: i64,
    pub rating: i64,
    pub comment: Option<String>,
    pub review_date: String,
    pub reviewer_name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReviewSummary {
    pub reviewer_name: String,
    pub rating: i64,
    pub comment: String,
    pub review_date: String,
}

pub fn flatten_reviews(rows: &[ReviewJoinRow]) -> Vec<ReviewSummary> {
    rows.iter()
        .map(|r| ReviewSummary {
            reviewer_name: placeholder(&r.reviewer_name),
            rating: r.rating,
            comment: r.comment.clone().unwrap_or_default(),
            review_date: r.review_date.clone(),
        })
        .collect()
}

fn placeholder(name: &Option<String>) -> String {
    match name {
        Some(name) if !name.is_empty() => name.clone(),
        _ => UNKNOWN.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn join_row(renter: Option<&str>, product: Option<&str>, owner: Option<&str>) -> RentalJoinRow {
        RentalJoinRow {
            rental_id: 7,
            renter_name: renter.map(str::to_owned),
            product_name: product.map(str::to_owned),
            owner_name: owner.map(str::to_owned),
            total_cost: 120.0,
            status: RentalStatus::Active,
            rental_start: "2024-05-01".to_owned(),
            rental_end: "2024-05-04".to_owned(),
        }
    }

    #[test]
    fn complete_row_flattens_verbatim() {
        let flat = flatten_rental(&join_row(Some("Bea"), Some("Gown"), Some("Ann")));
        assert_eq!(flat.renter_name, "Bea");
        assert_eq!(flat.product_name, "Gown");
        assert_eq!(flat.owner_name, "Ann");
        assert_eq!(flat.total_cost, 120.0);
    }

    #[test]
    fn missing_references_become_placeholders() {
        let flat = flatten_rental(&join_row(None, None, Some("Ann")));
        assert_eq!(flat.renter_name, UNKNOWN);
        assert_eq!(flat.product_name, UNKNOWN);
        assert_eq!(flat.owner_name, "Ann");
    }

    #[test]
    fn maintenance_schedule_flags_overdue() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();
        let row = MaintenanceJoinRow {
            maintenance_id: 1,
            product_id: 1,
            product_name: Some("Gown".to_owned()),
            last_cleaned: "2024-05-01".to_owned(),
            next_cleaning_due: "2024-06-01".to_owned(),
            status: MaintenanceStatus::Pending,
        };
        let flat = flatten_maintenance_row(&row, today);
        assert_eq!(flat.schedule, "Overdue");

        let row = MaintenanceJoinRow {
            next_cleaning_due: "2024-07-01".to_owned(),
            ..row
        };
        assert_eq!(flatten_maintenance_row(&row, today).schedule, "On Schedule");
    }

    #[test]
    fn unparseable_due_date_is_not_a_panic() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();
        let row = MaintenanceJoinRow {
            maintenance_id: 1,
            product_id: 1,
            product_name: None,
            last_cleaned: "2024-05-01".to_owned(),
            next_cleaning_due: "someday".to_owned(),
            status: MaintenanceStatus::NeedsCleaning,
        };
        let flat = flatten_maintenance_row(&row, today);
        assert_eq!(flat.schedule, UNKNOWN);
        assert_eq!(flat.product_name, UNKNOWN);
    }
}
