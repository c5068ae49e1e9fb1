//! Row fetcher and write operations against the SQLite store.
//!
//! Reads return `Result<Vec<T>, sqlx::Error>`: a failed fetch is an `Err`,
//! a successful fetch with nothing in it is `Ok(vec![])`, and callers must
//! treat the two differently. Joins are one level deep; the flattening of
//! joined rows lives in `crate::join`.

use chrono::{Days, NaiveDate};

use crate::errors::AppError;
use crate::join::{MaintenanceJoinRow, RentalJoinRow, ReviewJoinRow};
use crate::models::{
    duration_days, MaintenanceStatus, Product, ProductOwnerRow, Rental, RentalStatus, Review,
    Role, User,
};
use crate::AppState;

pub async fn get_all_users(state: &AppState) -> Result<Vec<User>, sqlx::Error> {
    let pool = state.db_pool.clone();
    sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY user_id")
        .fetch_all(&pool)
        .await
}

pub async fn get_users_by_role(state: &AppState, role: Role) -> Result<Vec<User>, sqlx::Error> {
    let pool = state.db_pool.clone();
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE role = $1 ORDER BY user_id")
        .bind(role)
        .fetch_all(&pool)
        .await
}

/// Everyone who can list products or administer the platform.
pub async fn get_sellers_and_admins(state: &AppState) -> Result<Vec<User>, sqlx::Error> {
    let pool = state.db_pool.clone();
    sqlx::query_as::<_, User>(
        "SELECT * FROM users WHERE role IN ($1, $2, $3) ORDER BY user_id",
    )
    .bind(Role::Owner)
    .bind(Role::Admin)
    .bind(Role::Both)
    .fetch_all(&pool)
    .await
}

pub async fn get_user_by_id(state: &AppState, id: i64) -> Result<Option<User>, sqlx::Error> {
    let pool = state.db_pool.clone();
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE user_id = $1")
        .bind(id)
        .fetch_optional(&pool)
        .await
}

pub async fn get_all_products(state: &AppState) -> Result<Vec<Product>, sqlx::Error> {
    let pool = state.db_pool.clone();
    sqlx::query_as::<_, Product>("SELECT * FROM products ORDER BY product_id")
        .fetch_all(&pool)
        .await
}

pub async fn get_product_by_id(
    state: &AppState,
    id: i64,
) -> Result<Option<Product>, sqlx::Error> {
    let pool = state.db_pool.clone();
    sqlx::query_as::<_, Product>("SELECT * FROM products WHERE product_id = $1")
        .bind(id)
        .fetch_optional(&pool)
        .await
}

pub async fn get_products_by_owner(
    state: &AppState,
    owner_id: i64,
) -> Result<Vec<Product>, sqlx::Error> {
    let pool = state.db_pool.clone();
    sqlx::query_as::<_, Product>(
        "SELECT * FROM products WHERE owner_id = $1 ORDER BY product_id",
    )
    .bind(owner_id)
    .fetch_all(&pool)
    .await
}

pub async fn get_products_with_owner(
    state: &AppState,
) -> Result<Vec<ProductOwnerRow>, sqlx::Error> {
    let pool = state.db_pool.clone();
    sqlx::query_as::<_, ProductOwnerRow>(
        "SELECT p.product_id, p.name, p.category, p.sub_category, p.owner_id,
                p.rental_price, p.available_quantity, u.name AS owner_name
         FROM products p
         LEFT JOIN users u ON u.user_id = p.owner_id
         ORDER BY p.product_id",
    )
    .fetch_all(&pool)
    .await
}

pub async fn get_all_rentals(state: &AppState) -> Result<Vec<Rental>, sqlx::Error> {
    let pool = state.db_pool.clone();
    sqlx::query_as::<_, Rental>("SELECT * FROM rentals ORDER BY rental_id")
        .fetch_all(&pool)
        .await
}

const RENTAL_JOIN: &str = "SELECT r.rental_id, ren.name AS renter_name,
        p.name AS product_name, own.name AS owner_name,
        r.total_cost, r.status, r.rental_start, r.rental_end
 FROM rentals r
 LEFT JOIN users ren ON ren.user_id = r.renter_id
 LEFT JOIN products p ON p.product_id = r.product_id
 LEFT JOIN users own ON own.user_id = p.owner_id";

/// Rentals joined with renter, product, and owner names, newest first.
pub async fn get_rentals_with_names(
    state: &AppState,
) -> Result<Vec<RentalJoinRow>, sqlx::Error> {
    let pool = state.db_pool.clone();
    sqlx::query_as::<_, RentalJoinRow>(&format!("{RENTAL_JOIN} ORDER BY r.rental_id DESC"))
        .fetch_all(&pool)
        .await
}

pub async fn get_rentals_with_names_for_renter(
    state: &AppState,
    renter_id: i64,
) -> Result<Vec<RentalJoinRow>, sqlx::Error> {
    let pool = state.db_pool.clone();
    sqlx::query_as::<_, RentalJoinRow>(&format!(
        "{RENTAL_JOIN} WHERE r.renter_id = $1 ORDER BY r.rental_id DESC"
    ))
    .bind(renter_id)
    .fetch_all(&pool)
    .await
}

pub async fn get_all_reviews(state: &AppState) -> Result<Vec<Review>, sqlx::Error> {
    let pool = state.db_pool.clone();
    sqlx::query_as::<_, Review>("SELECT * FROM reviews ORDER BY review_id")
        .fetch_all(&pool)
        .await
}

pub async fn get_reviews_for_product(
    state: &AppState,
    product_id: i64,
) -> Result<Vec<ReviewJoinRow>, sqlx::Error> {
    let pool = state.db_pool.clone();
    sqlx::query_as::<_, ReviewJoinRow>(
        "SELECT rv.review_id, rv.product_id, rv.rating, rv.comment, rv.review_date,
                u.name AS reviewer_name
         FROM reviews rv
         LEFT JOIN users u ON u.user_id = rv.user_id
         WHERE rv.product_id = $1
         ORDER BY rv.review_date DESC",
    )
    .bind(product_id)
    .fetch_all(&pool)
    .await
}

pub async fn get_maintenance_with_product(
    state: &AppState,
) -> Result<Vec<MaintenanceJoinRow>, sqlx::Error> {
    let pool = state.db_pool.clone();
    sqlx::query_as::<_, MaintenanceJoinRow>(
        "SELECT m.maintenance_id, m.product_id, p.name AS product_name,
                m.last_cleaned, m.next_cleaning_due, m.status
         FROM maintenance m
         LEFT JOIN products p ON p.product_id = m.product_id
         ORDER BY m.next_cleaning_due",
    )
    .fetch_all(&pool)
    .await
}

pub async fn get_maintenance_for_owner(
    state: &AppState,
    owner_id: i64,
) -> Result<Vec<MaintenanceJoinRow>, sqlx::Error> {
    let pool = state.db_pool.clone();
    sqlx::query_as::<_, MaintenanceJoinRow>(
        "SELECT m.maintenance_id, m.product_id, p.name AS product_name,
                m.last_cleaned, m.next_cleaning_due, m.status
         FROM maintenance m
         JOIN products p ON p.product_id = m.product_id
         WHERE p.owner_id = $1
         ORDER BY m.next_cleaning_due",
    )
    .bind(owner_id)
    .fetch_all(&pool)
    .await
}

pub async fn create_user(
    state: &AppState,
    name: &str,
    email: &str,
    phone: &str,
    role: Role,
) -> Result<User, AppError> {
    let pool = state.db_pool.clone();
    let user = sqlx::query_as::<_, User>(
        "INSERT INTO users (name, email, phone, role) VALUES ($1, $2, $3, $4) RETURNING *",
    )
    .bind(name)
    .bind(email)
    .bind(phone)
    .bind(role)
    .fetch_one(&pool)
    .await?;
    log::info!("User created: {} ({})", user.name, user.user_id);
    Ok(user)
}

pub async fn create_product(
    state: &AppState,
    name: &str,
    category: &str,
    sub_category: Option<&str>,
    owner_id: i64,
    rental_price: f64,
    available_quantity: i64,
) -> Result<Product, AppError> {
    if rental_price <= 0.0 {
        return Err(AppError::Invalid("rental price must be positive".into()));
    }
    if available_quantity < 0 {
        return Err(AppError::Invalid("quantity cannot be negative".into()));
    }
    let pool = state.db_pool.clone();
    let product = sqlx::query_as::<_, Product>(
        "INSERT INTO products (name, category, sub_category, owner_id, rental_price, available_quantity)
         VALUES ($1, $2, $3, $4, $5, $6) RETURNING *",
    )
    .bind(name)
    .bind(category)
    .bind(sub_category)
    .bind(owner_id)
    .bind(rental_price)
    .bind(available_quantity)
    .fetch_one(&pool)
    .await?;
    log::info!("Product listed: {} ({})", product.name, product.product_id);
    Ok(product)
}

/// Days of buffer before a returned product is due for cleaning.
const CLEANING_GRACE_DAYS: u64 = 7;

/// Create a rental, all in one transaction: validates the dates and the
/// available quantity, derives the total cost as price × duration × quantity,
/// decrements the product's availability, and schedules a cleaning for after
/// the return.
pub async fn create_rental(
    state: &AppState,
    renter_id: i64,
    product_id: i64,
    rental_start: &str,
    rental_end: &str,
    quantity: i64,
) -> Result<Rental, AppError> {
    let days = duration_days(rental_start, rental_end).ok_or_else(|| {
        AppError::Invalid("rental dates must be valid and end on or after the start".into())
    })?;
    if days < 1 {
        return Err(AppError::Invalid(
            "rental must span at least one day".into(),
        ));
    }
    if quantity < 1 {
        return Err(AppError::Invalid("quantity must be at least one".into()));
    }

    let pool = state.db_pool.clone();
    let mut tx = pool.begin().await?;

    let product =
        sqlx::query_as::<_, Product>("SELECT * FROM products WHERE product_id = $1")
            .bind(product_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(AppError::NotFound)?;

    let updated = sqlx::query(
        "UPDATE products SET available_quantity = available_quantity - $1
         WHERE product_id = $2 AND available_quantity >= $1",
    )
    .bind(quantity)
    .bind(product_id)
    .execute(&mut *tx)
    .await?;
    if updated.rows_affected() != 1 {
        return Err(AppError::Invalid(format!(
            "only {} of {} available",
            product.available_quantity, product.name
        )));
    }

    let total_cost = product.rental_price * days as f64 * quantity as f64;
    let rental = sqlx::query_as::<_, Rental>(
        "INSERT INTO rentals (renter_id, product_id, rental_start, rental_end, quantity, total_cost, status)
         VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING *",
    )
    .bind(renter_id)
    .bind(product_id)
    .bind(rental_start)
    .bind(rental_end)
    .bind(quantity)
    .bind(total_cost)
    .bind(RentalStatus::Pending)
    .fetch_one(&mut *tx)
    .await?;

    // schedule a cleaning once the rental comes back
    let end = NaiveDate::parse_from_str(rental_end, "%Y-%m-%d")
        .map_err(|e| AppError::Invalid(e.to_string()))?;
    let due = end
        .checked_add_days(Days::new(CLEANING_GRACE_DAYS))
        .unwrap_or(end);
    sqlx::query(
        "INSERT INTO maintenance (product_id, last_cleaned, next_cleaning_due, status)
         VALUES ($1, $2, $3, $4)",
    )
    .bind(product_id)
    .bind(rental_end)
    .bind(due.format("%Y-%m-%d").to_string())
    .bind(MaintenanceStatus::Pending)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    log::info!(
        "Rental created: {} rents {} x{} for {} days (${:.2})",
        renter_id,
        product_id,
        quantity,
        days,
        total_cost
    );
    Ok(rental)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    // One connection only: each in-memory SQLite connection is its own
    // database, so a wider pool would scatter the tables.
    async fn test_state() -> AppState {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("in-memory pool");
        sqlx::migrate!().run(&pool).await.expect("migrations");
        AppState { db_pool: pool }
    }

    async fn seed_owner_and_product(state: &AppState) -> (User, Product) {
        let owner = create_user(state, "Ann", "ann@example.com", "555-0100", Role::Owner)
            .await
            .unwrap();
        let product = create_product(
            state,
            "Classic Tuxedo",
            "mens",
            Some("Tuxedo"),
            owner.user_id,
            50.0,
            3,
        )
        .await
        .unwrap();
        (owner, product)
    }

    #[tokio::test]
    async fn empty_tables_fetch_as_empty_not_error() {
        let state = test_state().await;
        let products = get_all_products(&state).await.unwrap();
        assert!(products.is_empty());
        let rentals = get_all_rentals(&state).await.unwrap();
        assert!(rentals.is_empty());
    }

    #[tokio::test]
    async fn rental_creation_derives_cost_and_decrements_quantity() {
        let state = test_state().await;
        let (_, product) = seed_owner_and_product(&state).await;
        let renter = create_user(&state, "Bea", "bea@example.com", "555-0101", Role::Renter)
            .await
            .unwrap();

        let rental = create_rental(
            &state,
            renter.user_id,
            product.product_id,
            "2024-03-01",
            "2024-03-03",
            2,
        )
        .await
        .unwrap();

        // 50.0/day × 2 days × 2 items
        assert_eq!(rental.total_cost, 200.0);
        assert_eq!(rental.status, RentalStatus::Pending);

        let product = get_product_by_id(&state, product.product_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(product.available_quantity, 1);

        // a cleaning is scheduled after the return
        let maintenance = get_maintenance_with_product(&state).await.unwrap();
        assert_eq!(maintenance.len(), 1);
        assert_eq!(maintenance[0].next_cleaning_due, "2024-03-10");
        assert_eq!(maintenance[0].status, MaintenanceStatus::Pending);
    }

    #[tokio::test]
    async fn rental_creation_rejects_bad_input_and_leaves_quantity_alone() {
        let state = test_state().await;
        let (_, product) = seed_owner_and_product(&state).await;
        let renter = create_user(&state, "Bea", "bea@example.com", "555-0101", Role::Renter)
            .await
            .unwrap();

        // end before start
        let reversed = create_rental(
            &state,
            renter.user_id,
            product.product_id,
            "2024-03-05",
            "2024-03-01",
            1,
        )
        .await;
        assert!(matches!(reversed, Err(AppError::Invalid(_))));

        // more than available
        let too_many = create_rental(
            &state,
            renter.user_id,
            product.product_id,
            "2024-03-01",
            "2024-03-02",
            4,
        )
        .await;
        assert!(matches!(too_many, Err(AppError::Invalid(_))));

        // missing product
        let missing = create_rental(&state, renter.user_id, 999, "2024-03-01", "2024-03-02", 1)
            .await;
        assert!(matches!(missing, Err(AppError::NotFound)));

        let product = get_product_by_id(&state, product.product_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(product.available_quantity, 3);
    }

    #[tokio::test]
    async fn joined_rental_fetch_carries_all_three_names() {
        let state = test_state().await;
        let (owner, product) = seed_owner_and_product(&state).await;
        let renter = create_user(&state, "Bea", "bea@example.com", "555-0101", Role::Renter)
            .await
            .unwrap();
        create_rental(
            &state,
            renter.user_id,
            product.product_id,
            "2024-03-01",
            "2024-03-03",
            1,
        )
        .await
        .unwrap();

        let rows = get_rentals_with_names(&state).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].renter_name.as_deref(), Some("Bea"));
        assert_eq!(rows[0].product_name.as_deref(), Some(product.name.as_str()));
        assert_eq!(rows[0].owner_name.as_deref(), Some(owner.name.as_str()));
    }

    #[tokio::test]
    async fn role_filters_select_the_right_users() {
        let state = test_state().await;
        create_user(&state, "Ann", "ann@example.com", "1", Role::Owner)
            .await
            .unwrap();
        create_user(&state, "Bea", "bea@example.com", "2", Role::Renter)
            .await
            .unwrap();
        create_user(&state, "Cal", "cal@example.com", "3", Role::Admin)
            .await
            .unwrap();
        create_user(&state, "Dee", "dee@example.com", "4", Role::Both)
            .await
            .unwrap();

        let renters = get_users_by_role(&state, Role::Renter).await.unwrap();
        assert_eq!(renters.len(), 1);
        assert_eq!(renters[0].name, "Bea");

        let sellers = get_sellers_and_admins(&state).await.unwrap();
        let names: Vec<&str> = sellers.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, vec!["Ann", "Cal", "Dee"]);
    }

    #[tokio::test]
    async fn owner_scoped_fetches() {
        let state = test_state().await;
        let (owner, product) = seed_owner_and_product(&state).await;
        let other = create_user(&state, "Eve", "eve@example.com", "5", Role::Owner)
            .await
            .unwrap();
        create_product(&state, "Silk Scarf", "accessories", None, other.user_id, 10.0, 1)
            .await
            .unwrap();

        let mine = get_products_by_owner(&state, owner.user_id).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].product_id, product.product_id);

        let none = get_maintenance_for_owner(&state, owner.user_id).await.unwrap();
        assert!(none.is_empty());
    }
}
