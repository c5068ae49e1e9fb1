use actix_files::NamedFile;
use actix_web::{
    get, post,
    web::{self, Data},
    HttpResponse, Responder,
};
use serde::{Deserialize, Serialize};
use tera::Context;

use crate::db;
use crate::errors::AppError;
use crate::filters::CatalogQuery;
use crate::join::{flatten_maintenance, flatten_rentals, flatten_reviews, UNKNOWN};
use crate::models::Role;
use crate::reports;
use crate::table::{ChartPoint, Column, Table};
use crate::{AppState, TEMPLATES};

fn render(template: &str, context: &Context) -> Result<HttpResponse, AppError> {
    let rendered = TEMPLATES.render(template, context).map_err(|e| {
        log::error!("Failed to render template {}: {}", template, e);
        AppError::Template(e)
    })?;
    Ok(HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(rendered))
}

/// favicon handler
#[get("/favicon")]
pub async fn favicon_handler() -> Result<impl Responder, AppError> {
    Ok(NamedFile::open("static/favicon.ico")?)
}

#[get("/")]
pub async fn index_handler(state: Data<AppState>) -> Result<impl Responder, AppError> {
    let (users, products, rentals) = tokio::try_join!(
        db::get_all_users(&state),
        db::get_all_products(&state),
        db::get_all_rentals(&state),
    )?;

    let mut context = Context::new();
    context.insert("title", "RentLoop");
    context.insert("user_count", &users.len());
    context.insert("product_count", &products.len());
    context.insert("rental_count", &rentals.len());
    context.insert("categories", &reports::category_distribution(&products));
    context.insert(
        "top_products",
        &Table::from_rows(
            vec![
                Column::new("product_name", "Product"),
                Column::new("revenue", "Total Revenue"),
            ],
            &reports::top_products_by_revenue(&rentals, &products, 5),
        ),
    );
    render("home.html", &context)
}

#[get("/products")]
pub async fn products_handler(
    state: Data<AppState>,
    query: web::Query<CatalogQuery>,
) -> Result<impl Responder, AppError> {
    let (rows, reviews) = tokio::try_join!(
        db::get_products_with_owner(&state),
        db::get_all_reviews(&state),
    )?;
    let details = reports::product_details(&rows, &reviews);

    let mut categories: Vec<&str> = details.iter().map(|p| p.category.as_str()).collect();
    categories.sort_unstable();
    categories.dedup();
    let mut sub_categories: Vec<&str> = details
        .iter()
        .filter_map(|p| p.sub_category.as_deref())
        .collect();
    sub_categories.sort_unstable();
    sub_categories.dedup();

    let query = query.into_inner();
    let filtered = query.clone().into_filter().apply(&details);

    let mut context = Context::new();
    context.insert("title", "Browse Products");
    context.insert("products", &filtered);
    context.insert("total", &filtered.len());
    context.insert("categories", &categories);
    context.insert("sub_categories", &sub_categories);
    context.insert("query", &query);
    render("products.html", &context)
}

#[get("/products/{id}")]
pub async fn product_detail_handler(
    state: Data<AppState>,
    path: web::Path<i64>,
) -> Result<impl Responder, AppError> {
    let product_id = path.into_inner();
    let product = db::get_product_by_id(&state, product_id)
        .await?
        .ok_or(AppError::NotFound)?;
    let (owner, reviews) = tokio::try_join!(
        db::get_user_by_id(&state, product.owner_id),
        db::get_reviews_for_product(&state, product_id),
    )?;

    let avg_rating = if reviews.is_empty() {
        None
    } else {
        Some(reviews.iter().map(|r| r.rating as f64).sum::<f64>() / reviews.len() as f64)
    };

    let mut context = Context::new();
    context.insert("title", &product.name);
    context.insert("product", &product);
    context.insert(
        "owner_name",
        &owner.map(|o| o.name).unwrap_or_else(|| UNKNOWN.to_owned()),
    );
    context.insert("avg_rating", &avg_rating);
    context.insert("reviews", &flatten_reviews(&reviews));
    render("product.html", &context)
}

#[derive(Deserialize)]
pub struct RentForm {
    renter_id: i64,
    rental_start: String,
    rental_end: String,
    quantity: i64,
}

#[post("/products/{id}/rent")]
pub async fn rent_form_handler(
    state: Data<AppState>,
    path: web::Path<i64>,
    web::Form(form): web::Form<RentForm>,
) -> Result<impl Responder, AppError> {
    let product_id = path.into_inner();
    let renter = db::get_user_by_id(&state, form.renter_id)
        .await?
        .ok_or(AppError::NotFound)?;
    if !renter.role.can_rent() {
        return Ok(HttpResponse::BadRequest().body("This account cannot rent products"));
    }

    match db::create_rental(
        &state,
        form.renter_id,
        product_id,
        &form.rental_start,
        &form.rental_end,
        form.quantity,
    )
    .await
    {
        Ok(rental) => Ok(HttpResponse::SeeOther()
            .append_header(("Location", format!("/products/{}", product_id)))
            .body(format!("Rental {} created", rental.rental_id))),
        Err(AppError::Invalid(msg)) => Ok(HttpResponse::BadRequest().body(msg)),
        Err(e) => Err(e),
    }
}

#[get("/list-product")]
pub async fn list_product_handler(state: Data<AppState>) -> Result<impl Responder, AppError> {
    let sellers = db::get_sellers_and_admins(&state).await?;
    let mut context = Context::new();
    context.insert("title", "List a Product");
    context.insert("sellers", &sellers);
    render("list_product.html", &context)
}

#[derive(Deserialize)]
pub struct NewProductForm {
    name: String,
    category: String,
    sub_category: Option<String>,
    owner_id: i64,
    rental_price: f64,
    available_quantity: i64,
}

#[post("/list-product")]
pub async fn list_product_form_handler(
    state: Data<AppState>,
    web::Form(form): web::Form<NewProductForm>,
) -> Result<impl Responder, AppError> {
    if form.name.trim().is_empty() || form.category.trim().is_empty() {
        return Ok(HttpResponse::BadRequest().body("Name and category are required"));
    }
    let owner = db::get_user_by_id(&state, form.owner_id)
        .await?
        .ok_or(AppError::NotFound)?;
    if !owner.role.can_list() && !owner.role.is_admin() {
        return Ok(HttpResponse::BadRequest().body("This account cannot list products"));
    }

    let sub_category = form
        .sub_category
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());
    match db::create_product(
        &state,
        form.name.trim(),
        form.category.trim(),
        sub_category,
        form.owner_id,
        form.rental_price,
        form.available_quantity,
    )
    .await
    {
        Ok(product) => Ok(HttpResponse::SeeOther()
            .append_header(("Location", format!("/products/{}", product.product_id)))
            .body("Product listed")),
        Err(AppError::Invalid(msg)) => Ok(HttpResponse::BadRequest().body(msg)),
        Err(e) => Err(e),
    }
}

#[get("/register")]
pub async fn register_handler() -> Result<impl Responder, AppError> {
    let mut context = Context::new();
    context.insert("title", "Register");
    render("register.html", &context)
}

#[derive(Deserialize)]
pub struct RegisterForm {
    name: String,
    email: String,
    phone: String,
    role: Role,
}

#[post("/register")]
pub async fn register_form_handler(
    state: Data<AppState>,
    web::Form(form): web::Form<RegisterForm>,
) -> Result<impl Responder, AppError> {
    if form.name.trim().is_empty() || form.email.trim().is_empty() {
        return Ok(HttpResponse::BadRequest().body("Name and email are required"));
    }
    if !form.email.contains('@') {
        return Ok(HttpResponse::BadRequest().body("Invalid email address"));
    }
    let lc_email = form.email.to_lowercase();

    let user = db::create_user(&state, form.name.trim(), &lc_email, &form.phone, form.role)
        .await?;
    Ok(HttpResponse::SeeOther()
        .append_header(("Location", format!("/dashboard/{}", user.user_id)))
        .body("User registered successfully"))
}

#[get("/dashboard/{user_id}")]
pub async fn dashboard_handler(
    state: Data<AppState>,
    path: web::Path<i64>,
) -> Result<impl Responder, AppError> {
    let user_id = path.into_inner();
    let user = db::get_user_by_id(&state, user_id)
        .await?
        .ok_or(AppError::NotFound)?;

    // role decides the dashboard composition once, here
    let role = user.role;
    let mut context = Context::new();
    context.insert("title", "Dashboard");
    context.insert("user", &user);
    context.insert("role_label", role.label());
    context.insert("can_list", &role.can_list());
    context.insert("can_rent", &role.can_rent());
    context.insert("is_admin", &role.is_admin());

    if role.can_list() {
        let (owned, rentals, maintenance) = tokio::try_join!(
            db::get_products_by_owner(&state, user_id),
            db::get_all_rentals(&state),
            db::get_maintenance_for_owner(&state, user_id),
        )?;
        context.insert("listed_count", &owned.len());
        context.insert("owner_revenue", &reports::owner_revenue(&owned, &rentals));
        context.insert(
            "my_products",
            &Table::from_rows(
                vec![
                    Column::new("product_id", "ID"),
                    Column::new("name", "Product"),
                    Column::new("category", "Category"),
                    Column::new("rental_price", "Price/Day"),
                    Column::new("available_quantity", "Available"),
                ],
                &owned,
            ),
        );
        context.insert(
            "my_maintenance",
            &Table::from_rows(
                vec![
                    Column::new("product_name", "Product"),
                    Column::new("last_cleaned", "Last Cleaned"),
                    Column::new("next_cleaning_due", "Next Due"),
                    Column::new("status", "Status"),
                    Column::new("schedule", "Schedule"),
                ],
                &flatten_maintenance(&maintenance),
            ),
        );
    }
    if role.can_rent() {
        let rentals = db::get_rentals_with_names_for_renter(&state, user_id).await?;
        let summaries = flatten_rentals(&rentals);
        let spent: f64 = summaries.iter().map(|r| r.total_cost).sum();
        context.insert("rented_count", &summaries.len());
        context.insert("total_spent", &spent);
        context.insert(
            "my_rentals",
            &Table::from_rows(
                vec![
                    Column::new("rental_id", "Rental"),
                    Column::new("product_name", "Product"),
                    Column::new("owner_name", "Owner"),
                    Column::new("rental_start", "From"),
                    Column::new("rental_end", "To"),
                    Column::new("total_cost", "Cost"),
                    Column::new("status", "Status"),
                ],
                &summaries,
            ),
        );
    }
    if role.is_admin() {
        let (users, products, rentals) = tokio::try_join!(
            db::get_all_users(&state),
            db::get_all_products(&state),
            db::get_all_rentals(&state),
        )?;
        context.insert("platform_users", &users.len());
        context.insert("platform_products", &products.len());
        context.insert("platform_rentals", &rentals.len());
        context.insert("platform_revenue", &reports::total_spent(&rentals));
    }
    render("dashboard.html", &context)
}

#[get("/analytics")]
pub async fn analytics_handler(state: Data<AppState>) -> Result<impl Responder, AppError> {
    let (users, products, product_rows, rentals, rental_rows) = tokio::try_join!(
        db::get_all_users(&state),
        db::get_all_products(&state),
        db::get_products_with_owner(&state),
        db::get_all_rentals(&state),
        db::get_rentals_with_names(&state),
    )?;

    let mut context = Context::new();
    context.insert("title", "Analytics");
    context.insert(
        "products_by_owner",
        &Table::from_rows(
            vec![
                Column::new("owner_name", "Owner"),
                Column::new("total_products", "Total Products"),
            ],
            &reports::products_per_owner(&product_rows),
        ),
    );
    let recent: Vec<_> = flatten_rentals(&rental_rows).into_iter().take(10).collect();
    context.insert(
        "recent_rentals",
        &Table::from_rows(
            vec![
                Column::new("rental_id", "Rental ID"),
                Column::new("renter_name", "Renter"),
                Column::new("product_name", "Product"),
                Column::new("owner_name", "Owner"),
                Column::new("total_cost", "Amount"),
            ],
            &recent,
        ),
    );
    context.insert(
        "top_products",
        &Table::from_rows(
            vec![
                Column::new("product_name", "Product"),
                Column::new("revenue", "Revenue"),
            ],
            &reports::top_products_by_revenue(&rentals, &products, 5),
        ),
    );
    context.insert(
        "premium_products",
        &Table::from_rows(
            vec![
                Column::new("name", "Product"),
                Column::new("category", "Category"),
                Column::new("rental_price", "Price"),
                Column::new("category_avg_price", "Category Avg"),
            ],
            &reports::products_above_category_average(&products),
        ),
    );
    context.insert(
        "unrented",
        &Table::from_rows(
            vec![
                Column::new("product_id", "ID"),
                Column::new("name", "Product"),
            ],
            &reports::unrented_products(&products, &rentals),
        ),
    );
    context.insert(
        "avg_duration",
        &Table::from_rows(
            vec![
                Column::new("product_name", "Product"),
                Column::new("avg_duration_days", "Avg. Days"),
            ],
            &reports::average_duration_per_product(&rentals, &products),
        ),
    );
    context.insert(
        "high_spenders",
        &Table::from_rows(
            vec![
                Column::new("name", "Renter"),
                Column::new("email", "Email"),
                Column::new("total_spent", "Total Spent"),
            ],
            &reports::high_spending_renters(&rentals, &users),
        ),
    );
    context.insert(
        "power_users",
        &Table::from_rows(
            vec![
                Column::new("name", "User"),
                Column::new("email", "Email"),
                Column::new("total_products_listed", "Products Listed"),
                Column::new("total_spent_on_rentals", "Total Spent"),
            ],
            &reports::power_users(&users, &products, &rentals, 2, 700.0),
        ),
    );
    context.insert("role_distribution", &reports::role_distribution(&users));
    render("analytics.html", &context)
}

#[get("/reports/revenue")]
pub async fn revenue_reports_handler(state: Data<AppState>) -> Result<impl Responder, AppError> {
    let (users, products, rentals) = tokio::try_join!(
        db::get_all_users(&state),
        db::get_all_products(&state),
        db::get_all_rentals(&state),
    )?;
    let mut context = Context::new();
    context.insert("title", "Revenue Reports");
    context.insert(
        "top_products",
        &Table::from_rows(
            vec![
                Column::new("product_name", "Product"),
                Column::new("revenue", "Total Revenue"),
            ],
            &reports::top_products_by_revenue(&rentals, &products, 5),
        ),
    );
    context.insert(
        "high_spenders",
        &Table::from_rows(
            vec![
                Column::new("name", "Customer Name"),
                Column::new("email", "Email"),
                Column::new("total_spent", "Total Spent"),
            ],
            &reports::high_spending_renters(&rentals, &users),
        ),
    );
    render("revenue.html", &context)
}

#[get("/reports/products")]
pub async fn product_analytics_handler(
    state: Data<AppState>,
) -> Result<impl Responder, AppError> {
    let (products, product_rows, rentals) = tokio::try_join!(
        db::get_all_products(&state),
        db::get_products_with_owner(&state),
        db::get_all_rentals(&state),
    )?;
    let mut context = Context::new();
    context.insert("title", "Product Analytics");
    context.insert(
        "owners",
        &Table::from_rows(
            vec![
                Column::new("owner_name", "Owner"),
                Column::new("total_products", "Total Products"),
            ],
            &reports::products_per_owner(&product_rows),
        ),
    );
    context.insert(
        "power_sellers",
        &Table::from_rows(
            vec![
                Column::new("owner_name", "Owner"),
                Column::new("total_products", "Total Products"),
            ],
            &reports::owners_with_more_than(&product_rows, 2),
        ),
    );
    context.insert(
        "unrented",
        &Table::from_rows(
            vec![
                Column::new("product_id", "ID"),
                Column::new("name", "Product Name"),
                Column::new("category", "Category"),
                Column::new("rental_price", "Price"),
            ],
            &reports::unrented_products(&products, &rentals),
        ),
    );
    context.insert(
        "premium",
        &Table::from_rows(
            vec![
                Column::new("name", "Product Name"),
                Column::new("category", "Category"),
                Column::new("rental_price", "Price"),
                Column::new("category_avg_price", "Category Avg Price"),
            ],
            &reports::products_above_category_average(&products),
        ),
    );
    render("product_analytics.html", &context)
}

#[get("/renters")]
pub async fn renters_handler(state: Data<AppState>) -> Result<impl Responder, AppError> {
    let renters = db::get_users_by_role(&state, Role::Renter).await?;
    let mut context = Context::new();
    context.insert("title", "Renters");
    context.insert(
        "renters",
        &Table::from_rows(
            vec![
                Column::new("user_id", "ID"),
                Column::new("name", "Name"),
                Column::new("email", "Email"),
                Column::new("phone", "Phone"),
            ],
            &renters,
        ),
    );
    render("renters.html", &context)
}

#[get("/owners")]
pub async fn owners_handler(state: Data<AppState>) -> Result<impl Responder, AppError> {
    let product_rows = db::get_products_with_owner(&state).await?;
    let columns = || {
        vec![
            Column::new("owner_name", "Owner"),
            Column::new("total_products", "Total Products"),
        ]
    };
    let mut context = Context::new();
    context.insert("title", "Product Owners");
    context.insert(
        "owners",
        &Table::from_rows(columns(), &reports::products_per_owner(&product_rows)),
    );
    context.insert(
        "busy_owners",
        &Table::from_rows(columns(), &reports::owners_with_more_than(&product_rows, 2)),
    );
    render("owners.html", &context)
}

#[get("/rentals")]
pub async fn rental_pairs_handler(state: Data<AppState>) -> Result<impl Responder, AppError> {
    let rows = db::get_rentals_with_names(&state).await?;
    let mut context = Context::new();
    context.insert("title", "Rental Transactions");
    context.insert(
        "rentals",
        &Table::from_rows(
            vec![
                Column::new("rental_id", "Rental ID"),
                Column::new("renter_name", "Renter"),
                Column::new("product_name", "Product"),
                Column::new("owner_name", "Owner"),
                Column::new("rental_start", "From"),
                Column::new("rental_end", "To"),
                Column::new("total_cost", "Amount"),
                Column::new("status", "Status"),
            ],
            &flatten_rentals(&rows),
        ),
    );
    render("rentals.html", &context)
}

#[get("/maintenance")]
pub async fn maintenance_handler(state: Data<AppState>) -> Result<impl Responder, AppError> {
    let rows = db::get_maintenance_with_product(&state).await?;
    let summaries = flatten_maintenance(&rows);
    let overdue = summaries.iter().filter(|m| m.schedule == "Overdue").count();
    let mut context = Context::new();
    context.insert("title", "Maintenance");
    context.insert("record_count", &summaries.len());
    context.insert("overdue_count", &overdue);
    context.insert(
        "records",
        &Table::from_rows(
            vec![
                Column::new("maintenance_id", "ID"),
                Column::new("product_name", "Product"),
                Column::new("last_cleaned", "Last Cleaned"),
                Column::new("next_cleaning_due", "Next Due"),
                Column::new("status", "Status"),
                Column::new("schedule", "Schedule"),
            ],
            &summaries,
        ),
    );
    render("maintenance.html", &context)
}

#[derive(Serialize)]
struct EmailRole {
    email: String,
    role: &'static str,
}

#[derive(Deserialize)]
pub struct QueriesParams {
    category: Option<String>,
}

#[get("/queries")]
pub async fn data_queries_handler(
    state: Data<AppState>,
    params: web::Query<QueriesParams>,
) -> Result<impl Responder, AppError> {
    let (users, products, rentals, reviews, sellers) = tokio::try_join!(
        db::get_all_users(&state),
        db::get_all_products(&state),
        db::get_all_rentals(&state),
        db::get_all_reviews(&state),
        db::get_sellers_and_admins(&state),
    )?;

    let seller_rows: Vec<EmailRole> = sellers
        .iter()
        .map(|u| EmailRole {
            email: u.email.clone(),
            role: u.role.label(),
        })
        .collect();

    let mut context = Context::new();
    context.insert("title", "Data Queries");
    context.insert(
        "top_renters",
        &Table::from_rows(
            vec![
                Column::new("name", "Name"),
                Column::new("email", "Email"),
                Column::new("phone", "Phone"),
                Column::new("rental_count", "Rentals"),
            ],
            &reports::rental_counts_per_renter(&rentals, &users),
        ),
    );
    context.insert("category_distribution", &reports::category_distribution(&products));
    if let Some(category) = params.category.as_deref().filter(|c| !c.is_empty()) {
        context.insert("selected_category", category);
        context.insert(
            "sub_category_distribution",
            &reports::sub_category_distribution(&products, category),
        );
    }
    context.insert(
        "avg_duration",
        &Table::from_rows(
            vec![
                Column::new("category", "Category"),
                Column::new("avg_duration_days", "Average Days"),
            ],
            &reports::average_duration_by_category(&rentals, &products),
        ),
    );
    context.insert(
        "sellers_admins",
        &Table::from_rows(
            vec![
                Column::new("email", "Email"),
                Column::new("role", "Role"),
            ],
            &seller_rows,
        ),
    );
    context.insert(
        "rated_products",
        &Table::from_rows(
            vec![
                Column::new("name", "Product"),
                Column::new("category", "Category"),
                Column::new("avg_rating", "Avg Rating"),
            ],
            &reports::rated_products(&products, &reviews),
        ),
    );
    context.insert("role_distribution", &reports::role_distribution(&users));
    render("queries.html", &context)
}

#[get("/api/charts/top-revenue")]
pub async fn api_top_revenue(state: Data<AppState>) -> Result<impl Responder, AppError> {
    let (products, rentals) = tokio::try_join!(
        db::get_all_products(&state),
        db::get_all_rentals(&state),
    )?;
    let points: Vec<ChartPoint> = reports::top_products_by_revenue(&rentals, &products, 5)
        .into_iter()
        .map(|r| ChartPoint::new(r.product_name, r.revenue))
        .collect();
    Ok(web::Json(points))
}

#[get("/api/charts/categories")]
pub async fn api_category_distribution(
    state: Data<AppState>,
) -> Result<impl Responder, AppError> {
    let products = db::get_all_products(&state).await?;
    let points: Vec<ChartPoint> = reports::category_distribution(&products)
        .into_iter()
        .map(|c| ChartPoint::new(c.category, c.count as f64))
        .collect();
    Ok(web::Json(points))
}

#[get("/api/charts/roles")]
pub async fn api_role_distribution(state: Data<AppState>) -> Result<impl Responder, AppError> {
    let users = db::get_all_users(&state).await?;
    let points: Vec<ChartPoint> = reports::role_distribution(&users)
        .into_iter()
        .map(|r| ChartPoint::new(r.role, r.count as f64))
        .collect();
    Ok(web::Json(points))
}

#[get("/api/charts/avg-duration")]
pub async fn api_avg_duration(state: Data<AppState>) -> Result<impl Responder, AppError> {
    let (products, rentals) = tokio::try_join!(
        db::get_all_products(&state),
        db::get_all_rentals(&state),
    )?;
    let points: Vec<ChartPoint> = reports::average_duration_by_category(&rentals, &products)
        .into_iter()
        .map(|c| ChartPoint::new(c.category, c.avg_duration_days))
        .collect();
    Ok(web::Json(points))
}

#[get("/api/tables/rentals")]
pub async fn api_rentals(state: Data<AppState>) -> Result<impl Responder, AppError> {
    let rows = db::get_rentals_with_names(&state).await?;
    let table = Table::from_rows(
        vec![
            Column::new("rental_id", "Rental ID"),
            Column::new("renter_name", "Renter"),
            Column::new("product_name", "Product"),
            Column::new("owner_name", "Owner"),
            Column::new("total_cost", "Amount"),
            Column::new("status", "Status"),
        ],
        &flatten_rentals(&rows),
    );
    Ok(web::Json(table))
}

#[get("/api/tables/premium-products")]
pub async fn api_premium_products(state: Data<AppState>) -> Result<impl Responder, AppError> {
    let products = db::get_all_products(&state).await?;
    let table = Table::from_rows(
        vec![
            Column::new("name", "Product"),
            Column::new("category", "Category"),
            Column::new("rental_price", "Price"),
            Column::new("category_avg_price", "Category Avg"),
        ],
        &reports::products_above_category_average(&products),
    );
    Ok(web::Json(table))
}
