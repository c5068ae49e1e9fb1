//! Catalog filtering and ordering.
//!
//! Each predicate is independent; the composed filter is the conjunction of
//! the active ones. An inactive predicate (empty search, `all` category,
//! empty sub-category set) matches every row. Sorting always works on a
//! fresh vector so callers can keep using the input slice.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::models::ProductDetails;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortKey {
    #[default]
    PriceAsc,
    PriceDesc,
    RatingDesc,
}

/// Query-string shape for the catalog page. Sub-categories arrive as a
/// comma-separated list because the query codec has no repeated-key vectors.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogQuery {
    pub search: Option<String>,
    pub category: Option<String>,
    pub sub_categories: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub min_rating: Option<f64>,
    pub max_rating: Option<f64>,
    pub sort: SortKey,
}

impl CatalogQuery {
    pub fn into_filter(self) -> CatalogFilter {
        let sub_categories = self
            .sub_categories
            .map(|s| {
                s.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default();
        CatalogFilter {
            search: self.search.filter(|s| !s.trim().is_empty()),
            category: self.category.filter(|c| !c.is_empty() && c != "all"),
            sub_categories,
            min_price: self.min_price,
            max_price: self.max_price,
            min_rating: self.min_rating,
            max_rating: self.max_rating,
            sort: self.sort,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CatalogFilter {
    pub search: Option<String>,
    pub category: Option<String>,
    pub sub_categories: Vec<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub min_rating: Option<f64>,
    pub max_rating: Option<f64>,
    pub sort: SortKey,
}

impl CatalogFilter {
    /// Conjunction of all active predicates. Range bounds are inclusive;
    /// a product without reviews is rated 0 for range purposes.
    pub fn matches(&self, p: &ProductDetails) -> bool {
        if let Some(search) = &self.search {
            if !p.name.to_lowercase().contains(&search.to_lowercase()) {
                return false;
            }
        }
        if let Some(category) = &self.category {
            if &p.category != category {
                return false;
            }
        }
        if !self.sub_categories.is_empty() {
            match &p.sub_category {
                Some(sub) if self.sub_categories.iter().any(|s| s == sub) => {}
                _ => return false,
            }
        }
        if let Some(min) = self.min_price {
            if p.rental_price < min {
                return false;
            }
        }
        if let Some(max) = self.max_price {
            if p.rental_price > max {
                return false;
            }
        }
        let rating = p.avg_rating.unwrap_or(0.0);
        if let Some(min) = self.min_rating {
            if rating < min {
                return false;
            }
        }
        if let Some(max) = self.max_rating {
            if rating > max {
                return false;
            }
        }
        true
    }

    /// Filter then order into a new vector; the input is left untouched.
    pub fn apply(&self, products: &[ProductDetails]) -> Vec<ProductDetails> {
        let mut matched: Vec<ProductDetails> = products
            .iter()
            .filter(|p| self.matches(p))
            .cloned()
            .collect();
        matched.sort_by(|a, b| self.sort.compare(a, b));
        matched
    }
}

impl SortKey {
    fn compare(self, a: &ProductDetails, b: &ProductDetails) -> Ordering {
        match self {
            SortKey::PriceAsc => a
                .rental_price
                .partial_cmp(&b.rental_price)
                .unwrap_or(Ordering::Equal),
            SortKey::PriceDesc => b
                .rental_price
                .partial_cmp(&a.rental_price)
                .unwrap_or(Ordering::Equal),
            // unrated products sort as 0, so they land last
            SortKey::RatingDesc => b
                .avg_rating
                .unwrap_or(0.0)
                .partial_cmp(&a.avg_rating.unwrap_or(0.0))
                .unwrap_or(Ordering::Equal),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(
        id: i64,
        name: &str,
        category: &str,
        sub: Option<&str>,
        price: f64,
        rating: Option<f64>,
    ) -> ProductDetails {
        ProductDetails {
            product_id: id,
            name: name.to_owned(),
            category: category.to_owned(),
            sub_category: sub.map(str::to_owned),
            owner_name: "Ann".to_owned(),
            rental_price: price,
            available_quantity: 1,
            avg_rating: rating,
        }
    }

    fn catalog() -> Vec<ProductDetails> {
        vec![
            product(1, "Classic Tuxedo", "mens", Some("Tuxedo"), 90.0, Some(4.5)),
            product(2, "Evening Gown", "womens", Some("Gown"), 250.0, Some(3.0)),
            product(3, "Silk Scarf", "accessories", None, 20.0, None),
            product(4, "Velvet Tuxedo", "mens", Some("Tuxedo"), 180.0, Some(4.5)),
        ]
    }

    #[test]
    fn inactive_filters_match_everything() {
        let filter = CatalogQuery::default().into_filter();
        assert_eq!(filter.apply(&catalog()).len(), 4);
    }

    #[test]
    fn all_category_and_blank_search_are_noops() {
        let filter = CatalogQuery {
            category: Some("all".to_owned()),
            search: Some("   ".to_owned()),
            ..Default::default()
        }
        .into_filter();
        assert_eq!(filter.apply(&catalog()).len(), 4);
    }

    #[test]
    fn search_is_case_insensitive_substring() {
        let filter = CatalogQuery {
            search: Some("tuxedo".to_owned()),
            ..Default::default()
        }
        .into_filter();
        let found = filter.apply(&catalog());
        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|p| p.name.contains("Tuxedo")));
    }

    #[test]
    fn price_bounds_are_inclusive() {
        let filter = CatalogQuery {
            min_price: Some(90.0),
            max_price: Some(180.0),
            ..Default::default()
        }
        .into_filter();
        let found = filter.apply(&catalog());
        let ids: Vec<i64> = found.iter().map(|p| p.product_id).collect();
        assert_eq!(ids, vec![1, 4]);
    }

    #[test]
    fn missing_rating_counts_as_zero_in_range() {
        let filter = CatalogQuery {
            min_rating: Some(1.0),
            ..Default::default()
        }
        .into_filter();
        let found = filter.apply(&catalog());
        assert!(found.iter().all(|p| p.product_id != 3));
    }

    #[test]
    fn conjunction_is_order_independent() {
        let products = catalog();
        let combined = CatalogQuery {
            category: Some("mens".to_owned()),
            min_price: Some(100.0),
            search: Some("velvet".to_owned()),
            ..Default::default()
        }
        .into_filter();

        // same predicates applied one at a time, in a different order
        let step1 = CatalogQuery {
            search: Some("velvet".to_owned()),
            ..Default::default()
        }
        .into_filter()
        .apply(&products);
        let step2 = CatalogQuery {
            min_price: Some(100.0),
            ..Default::default()
        }
        .into_filter()
        .apply(&step1);
        let step3 = CatalogQuery {
            category: Some("mens".to_owned()),
            ..Default::default()
        }
        .into_filter()
        .apply(&step2);

        let direct = combined.apply(&products);
        let direct_ids: Vec<i64> = direct.iter().map(|p| p.product_id).collect();
        let stepped_ids: Vec<i64> = step3.iter().map(|p| p.product_id).collect();
        assert_eq!(direct_ids, stepped_ids);
        assert_eq!(direct_ids, vec![4]);
    }

    #[test]
    fn sub_category_membership() {
        let filter = CatalogQuery {
            sub_categories: Some("Tuxedo, Gown".to_owned()),
            ..Default::default()
        }
        .into_filter();
        let found = filter.apply(&catalog());
        // default price-asc ordering: 90, 180, 250
        let ids: Vec<i64> = found.iter().map(|p| p.product_id).collect();
        assert_eq!(ids, vec![1, 4, 2]);
    }

    #[test]
    fn rating_desc_puts_unrated_last_and_keeps_ties_stable() {
        let filter = CatalogQuery {
            sort: SortKey::RatingDesc,
            ..Default::default()
        }
        .into_filter();
        let sorted = filter.apply(&catalog());
        let ids: Vec<i64> = sorted.iter().map(|p| p.product_id).collect();
        assert_eq!(ids, vec![1, 4, 2, 3]);
    }

    #[test]
    fn apply_leaves_input_untouched() {
        let products = catalog();
        let before: Vec<i64> = products.iter().map(|p| p.product_id).collect();
        let filter = CatalogQuery {
            sort: SortKey::PriceDesc,
            ..Default::default()
        }
        .into_filter();
        let _ = filter.apply(&products);
        let after: Vec<i64> = products.iter().map(|p| p.product_id).collect();
        assert_eq!(before, after);
    }
}
