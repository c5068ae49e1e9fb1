//! Derived analytics over fetched rows.
//!
//! Every report is a pure function of its input slices: fetch rows, hand
//! them here, render the result. All group-by shapes go through the generic
//! reductions in [`crate::aggregate`] instead of bespoke per-view loops.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::aggregate::{average_by_group, by_desc, count_by_group, sum_by_group, top_n, Grouped};
use crate::join::UNKNOWN;
use crate::models::{Product, ProductDetails, ProductOwnerRow, Rental, Review, User};

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OwnerProductCount {
    pub owner_id: i64,
    pub owner_name: String,
    pub total_products: u64,
}

/// Listed products per owner, busiest owners first.
pub fn products_per_owner(rows: &[ProductOwnerRow]) -> Vec<OwnerProductCount> {
    let counted = count_by_group(rows, |p| Some(p.owner_id));
    let mut names: HashMap<i64, String> = HashMap::new();
    for row in rows {
        names.entry(row.owner_id).or_insert_with(|| {
            row.owner_name.clone().unwrap_or_else(|| UNKNOWN.to_owned())
        });
    }
    let mut out: Vec<OwnerProductCount> = counted
        .groups
        .into_iter()
        .map(|(owner_id, total_products)| OwnerProductCount {
            owner_id,
            owner_name: names
                .get(&owner_id)
                .cloned()
                .unwrap_or_else(|| UNKNOWN.to_owned()),
            total_products,
        })
        .collect();
    out.sort_by(|a, b| {
        b.total_products
            .cmp(&a.total_products)
            .then_with(|| a.owner_name.cmp(&b.owner_name))
    });
    out
}

/// Owners listing strictly more than `threshold` products.
pub fn owners_with_more_than(rows: &[ProductOwnerRow], threshold: u64) -> Vec<OwnerProductCount> {
    products_per_owner(rows)
        .into_iter()
        .filter(|o| o.total_products > threshold)
        .collect()
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PremiumProduct {
    pub product_id: i64,
    pub name: String,
    pub category: String,
    pub rental_price: f64,
    pub category_avg_price: f64,
}

/// Products priced strictly above the mean of their *own* category.
///
/// The mean is computed per category partition; comparing against the
/// global mean is wrong and the tests pin that down.
pub fn products_above_category_average(products: &[Product]) -> Vec<PremiumProduct> {
    let means = average_by_group(
        products,
        |p| Some(p.category.clone()),
        |p| Some(p.rental_price),
    );
    products
        .iter()
        .filter_map(|p| {
            let mean = *means.groups.get(&p.category)?;
            if p.rental_price > mean {
                Some(PremiumProduct {
                    product_id: p.product_id,
                    name: p.name.clone(),
                    category: p.category.clone(),
                    rental_price: p.rental_price,
                    category_avg_price: mean,
                })
            } else {
                None
            }
        })
        .collect()
}

/// Products that appear in no rental: a set difference on product ids.
pub fn unrented_products(products: &[Product], rentals: &[Rental]) -> Vec<Product> {
    let rented: HashSet<i64> = rentals.iter().map(|r| r.product_id).collect();
    products
        .iter()
        .filter(|p| !rented.contains(&p.product_id))
        .cloned()
        .collect()
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ProductRevenue {
    pub product_id: i64,
    pub product_name: String,
    pub revenue: f64,
}

/// Total rental revenue per product, highest first, first `n`. Rentals
/// whose product no longer exists are excluded (and counted as skips by
/// the aggregator), not coerced to a sentinel bucket.
pub fn top_products_by_revenue(
    rentals: &[Rental],
    products: &[Product],
    n: usize,
) -> Vec<ProductRevenue> {
    let names: HashMap<i64, &str> = products
        .iter()
        .map(|p| (p.product_id, p.name.as_str()))
        .collect();
    let summed = sum_by_group(
        rentals,
        |r| names.contains_key(&r.product_id).then_some(r.product_id),
        |r| Some(r.total_cost),
    );
    let mut rows: Vec<ProductRevenue> = summed
        .groups
        .into_iter()
        .map(|(product_id, revenue)| ProductRevenue {
            product_id,
            product_name: names[&product_id].to_owned(),
            revenue,
        })
        .collect();
    // deterministic base order before the stable top-n sort
    rows.sort_by_key(|r| r.product_id);
    top_n(&rows, by_desc(|r: &ProductRevenue| r.revenue), n)
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RenterActivity {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub rental_count: u64,
}

/// Rentals per renter, most active first.
pub fn rental_counts_per_renter(rentals: &[Rental], users: &[User]) -> Vec<RenterActivity> {
    let by_id: HashMap<i64, &User> = users.iter().map(|u| (u.user_id, u)).collect();
    let counted = count_by_group(rentals, |r| {
        by_id.contains_key(&r.renter_id).then_some(r.renter_id)
    });
    let mut rows: Vec<RenterActivity> = counted
        .groups
        .into_iter()
        .map(|(renter_id, rental_count)| {
            let user = by_id[&renter_id];
            RenterActivity {
                name: user.name.clone(),
                email: user.email.clone(),
                phone: user.phone.clone(),
                rental_count,
            }
        })
        .collect();
    rows.sort_by(|a, b| {
        b.rental_count
            .cmp(&a.rental_count)
            .then_with(|| a.name.cmp(&b.name))
    });
    rows
}

/// Mean rating keyed by product id. Products without reviews simply have
/// no entry; callers render that as "no rating", never as zero.
pub fn average_rating_per_product(reviews: &[Review]) -> Grouped<i64, f64> {
    average_by_group(reviews, |r| Some(r.product_id), |r| Some(r.rating as f64))
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RatedProduct {
    pub name: String,
    pub category: String,
    pub avg_rating: f64,
}

/// Reviewed products ordered by mean rating, best first.
pub fn rated_products(products: &[Product], reviews: &[Review]) -> Vec<RatedProduct> {
    let ratings = average_rating_per_product(reviews);
    let rows: Vec<RatedProduct> = products
        .iter()
        .filter_map(|p| {
            ratings.groups.get(&p.product_id).map(|avg| RatedProduct {
                name: p.name.clone(),
                category: p.category.clone(),
                avg_rating: *avg,
            })
        })
        .collect();
    top_n(&rows, by_desc(|r: &RatedProduct| r.avg_rating), rows.len())
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CategoryDuration {
    pub category: String,
    pub avg_duration_days: f64,
}

/// Mean rental duration per product category. Rentals with unparseable
/// dates, reversed dates, or a deleted product are skipped.
pub fn average_duration_by_category(
    rentals: &[Rental],
    products: &[Product],
) -> Vec<CategoryDuration> {
    let categories: HashMap<i64, &str> = products
        .iter()
        .map(|p| (p.product_id, p.category.as_str()))
        .collect();
    let averaged = average_by_group(
        rentals,
        |r| categories.get(&r.product_id).map(|c| c.to_string()),
        |r| r.duration_days().map(|d| d as f64),
    );
    let mut rows: Vec<CategoryDuration> = averaged
        .groups
        .into_iter()
        .map(|(category, avg_duration_days)| CategoryDuration {
            category,
            avg_duration_days,
        })
        .collect();
    rows.sort_by(|a, b| a.category.cmp(&b.category));
    rows
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ProductDuration {
    pub product_name: String,
    pub avg_duration_days: f64,
}

/// Mean rental duration per product, alphabetical.
pub fn average_duration_per_product(
    rentals: &[Rental],
    products: &[Product],
) -> Vec<ProductDuration> {
    let names: HashMap<i64, &str> = products
        .iter()
        .map(|p| (p.product_id, p.name.as_str()))
        .collect();
    let averaged = average_by_group(
        rentals,
        |r| names.get(&r.product_id).map(|n| n.to_string()),
        |r| r.duration_days().map(|d| d as f64),
    );
    let mut rows: Vec<ProductDuration> = averaged
        .groups
        .into_iter()
        .map(|(product_name, avg_duration_days)| ProductDuration {
            product_name,
            avg_duration_days,
        })
        .collect();
    rows.sort_by(|a, b| a.product_name.cmp(&b.product_name));
    rows
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Spender {
    pub name: String,
    pub email: String,
    pub total_spent: f64,
}

/// Renters whose total spend exceeds the mean of all per-renter totals.
/// The mean is global across renters, matching the product behavior; it is
/// deliberately not partitioned by category or role.
pub fn high_spending_renters(rentals: &[Rental], users: &[User]) -> Vec<Spender> {
    let totals = sum_by_group(rentals, |r| Some(r.renter_id), |r| Some(r.total_cost));
    if totals.groups.is_empty() {
        return Vec::new();
    }
    let mean = totals.groups.values().sum::<f64>() / totals.groups.len() as f64;
    let by_id: HashMap<i64, &User> = users.iter().map(|u| (u.user_id, u)).collect();
    let mut rows: Vec<Spender> = totals
        .groups
        .into_iter()
        .filter(|(_, total)| *total > mean)
        .filter_map(|(renter_id, total_spent)| {
            by_id.get(&renter_id).map(|user| Spender {
                name: user.name.clone(),
                email: user.email.clone(),
                total_spent,
            })
        })
        .collect();
    rows.sort_by(|a, b| {
        b.total_spent
            .partial_cmp(&a.total_spent)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.name.cmp(&b.name))
    });
    rows
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PowerUser {
    pub name: String,
    pub email: String,
    pub total_products_listed: u64,
    pub total_spent_on_rentals: f64,
}

/// Users who both list more than `min_listed` products and have spent more
/// than `min_spent` renting from others.
pub fn power_users(
    users: &[User],
    products: &[Product],
    rentals: &[Rental],
    min_listed: u64,
    min_spent: f64,
) -> Vec<PowerUser> {
    let listed = count_by_group(products, |p| Some(p.owner_id));
    let spent = sum_by_group(rentals, |r| Some(r.renter_id), |r| Some(r.total_cost));
    users
        .iter()
        .filter_map(|user| {
            let total_products_listed = *listed.groups.get(&user.user_id)?;
            let total_spent_on_rentals = *spent.groups.get(&user.user_id)?;
            if total_products_listed > min_listed && total_spent_on_rentals > min_spent {
                Some(PowerUser {
                    name: user.name.clone(),
                    email: user.email.clone(),
                    total_products_listed,
                    total_spent_on_rentals,
                })
            } else {
                None
            }
        })
        .collect()
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CategoryCount {
    pub category: String,
    pub count: u64,
}

pub fn category_distribution(products: &[Product]) -> Vec<CategoryCount> {
    let counted = count_by_group(products, |p| Some(p.category.clone()));
    let mut rows: Vec<CategoryCount> = counted
        .groups
        .into_iter()
        .map(|(category, count)| CategoryCount { category, count })
        .collect();
    rows.sort_by(|a, b| a.category.cmp(&b.category));
    rows
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SubCategoryCount {
    pub sub_category: String,
    pub count: u64,
}

pub fn sub_category_distribution(products: &[Product], category: &str) -> Vec<SubCategoryCount> {
    let in_category: Vec<&Product> = products
        .iter()
        .filter(|p| p.category == category)
        .collect();
    let counted = count_by_group(&in_category, |p| {
        Some(p.sub_category.clone().unwrap_or_else(|| "(none)".to_owned()))
    });
    let mut rows: Vec<SubCategoryCount> = counted
        .groups
        .into_iter()
        .map(|(sub_category, count)| SubCategoryCount { sub_category, count })
        .collect();
    rows.sort_by(|a, b| a.sub_category.cmp(&b.sub_category));
    rows
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RoleCount {
    pub role: &'static str,
    pub count: u64,
}

pub fn role_distribution(users: &[User]) -> Vec<RoleCount> {
    let counted = count_by_group(users, |u| Some(u.role));
    let mut rows: Vec<RoleCount> = counted
        .groups
        .into_iter()
        .map(|(role, count)| RoleCount {
            role: role.label(),
            count,
        })
        .collect();
    rows.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.role.cmp(b.role)));
    rows
}

/// Catalog enrichment: owner name and mean rating per product row.
pub fn product_details(rows: &[ProductOwnerRow], reviews: &[Review]) -> Vec<ProductDetails> {
    let ratings = average_rating_per_product(reviews);
    rows.iter()
        .map(|row| ProductDetails {
            product_id: row.product_id,
            name: row.name.clone(),
            category: row.category.clone(),
            sub_category: row.sub_category.clone(),
            owner_name: row
                .owner_name
                .clone()
                .unwrap_or_else(|| UNKNOWN.to_owned()),
            rental_price: row.rental_price,
            available_quantity: row.available_quantity,
            avg_rating: ratings.groups.get(&row.product_id).copied(),
        })
        .collect()
}

/// Revenue earned by one owner's listings across all rentals.
pub fn owner_revenue(owned: &[Product], rentals: &[Rental]) -> f64 {
    let mine: HashSet<i64> = owned.iter().map(|p| p.product_id).collect();
    rentals
        .iter()
        .filter(|r| mine.contains(&r.product_id))
        .map(|r| r.total_cost)
        .sum()
}

/// What one renter has spent across their rentals.
pub fn total_spent(rentals: &[Rental]) -> f64 {
    rentals.iter().map(|r| r.total_cost).sum()
}
