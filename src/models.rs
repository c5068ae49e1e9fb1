use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// What a user is allowed to do on the platform. Stored as TEXT in the
/// `users.role` column; `both` covers users who list and rent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Renter,
    Owner,
    Admin,
    Both,
}

impl Role {
    pub fn can_list(self) -> bool {
        matches!(self, Role::Owner | Role::Both)
    }

    pub fn can_rent(self) -> bool {
        matches!(self, Role::Renter | Role::Both)
    }

    pub fn is_admin(self) -> bool {
        matches!(self, Role::Admin)
    }

    pub fn label(self) -> &'static str {
        match self {
            Role::Renter => "Customer",
            Role::Owner => "Product Lister",
            Role::Admin => "Administrator",
            Role::Both => "Lister & Customer",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RentalStatus {
    Active,
    Pending,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MaintenanceStatus {
    Pending,
    Completed,
    Overdue,
    Clean,
    NeedsCleaning,
    Damaged,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub user_id: i64,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Product {
    pub product_id: i64,
    pub name: String,
    pub category: String,
    pub sub_category: Option<String>,
    pub owner_id: i64,
    pub rental_price: f64,
    pub available_quantity: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Rental {
    pub rental_id: i64,
    pub renter_id: i64,
    pub product_id: i64,
    pub rental_start: String,
    pub rental_end: String,
    pub quantity: i64,
    pub total_cost: f64,
    pub status: RentalStatus,
}

impl Rental {
    /// Rental duration in whole days, or `None` for malformed rows
    /// (unparseable dates or end before start). Aggregations skip those.
    pub fn duration_days(&self) -> Option<i64> {
        duration_days(&self.rental_start, &self.rental_end)
    }
}

/// Days between two ISO-8601 dates. `None` if either date fails to parse
/// or the end precedes the start.
pub fn duration_days(start: &str, end: &str) -> Option<i64> {
    let start = NaiveDate::parse_from_str(start, "%Y-%m-%d").ok()?;
    let end = NaiveDate::parse_from_str(end, "%Y-%m-%d").ok()?;
    let days = (end - start).num_days();
    if days < 0 {
        return None;
    }
    Some(days)
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Review {
    pub review_id: i64,
    pub user_id: i64,
    pub product_id: i64,
    pub rating: i64,
    pub comment: Option<String>,
    pub review_date: String,
}

/// Product row joined one level deep with its owner's display name.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ProductOwnerRow {
    pub product_id: i64,
    pub name: String,
    pub category: String,
    pub sub_category: Option<String>,
    pub owner_id: i64,
    pub rental_price: f64,
    pub available_quantity: i64,
    pub owner_name: Option<String>,
}

/// Catalog row enriched with owner name and average rating. The rating is
/// absent (not zero) when a product has no reviews.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductDetails {
    pub product_id: i64,
    pub name: String,
    pub category: String,
    pub sub_category: Option<String>,
    pub owner_name: String,
    pub rental_price: f64,
    pub available_quantity: i64,
    pub avg_rating: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rental(start: &str, end: &str) -> Rental {
        Rental {
            rental_id: 1,
            renter_id: 1,
            product_id: 1,
            rental_start: start.to_owned(),
            rental_end: end.to_owned(),
            quantity: 1,
            total_cost: 0.0,
            status: RentalStatus::Completed,
        }
    }

    #[test]
    fn duration_counts_whole_days() {
        assert_eq!(rental("2023-01-01", "2023-01-03").duration_days(), Some(2));
        assert_eq!(rental("2023-01-01", "2023-01-01").duration_days(), Some(0));
    }

    #[test]
    fn duration_rejects_reversed_and_unparseable_dates() {
        assert_eq!(rental("2023-01-03", "2023-01-01").duration_days(), None);
        assert_eq!(rental("not-a-date", "2023-01-01").duration_days(), None);
        assert_eq!(rental("2023-01-01", "01/03/2023").duration_days(), None);
    }

    #[test]
    fn role_capabilities() {
        assert!(Role::Owner.can_list() && !Role::Owner.can_rent());
        assert!(Role::Renter.can_rent() && !Role::Renter.can_list());
        assert!(Role::Both.can_list() && Role::Both.can_rent());
        assert!(Role::Admin.is_admin());
    }
}
