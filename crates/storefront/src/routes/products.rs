//! Product route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use shopfront_core::CurrencyCode;
use tower_sessions::Session;
use tracing::instrument;

use crate::api::types::{Category, Product};
use crate::error::AppError;
use crate::filters;
use crate::middleware::OptionalAuth;
use crate::routes::{NavView, PAGE_SIZE, money};
use crate::state::AppState;

/// Product display data for templates.
#[derive(Clone)]
pub struct ProductView {
    pub id: String,
    pub name: String,
    pub description: String,
    pub price: String,
    pub original_price: Option<String>,
    pub image: Option<String>,
    pub images: Vec<String>,
    pub in_stock: bool,
}

impl ProductView {
    /// Build the view for `product`, priced in `currency`.
    #[must_use]
    pub fn new(product: &Product, currency: CurrencyCode) -> Self {
        Self {
            id: product.id.to_string(),
            name: product.name.clone(),
            description: product.description.clone(),
            price: money(product.price, currency),
            original_price: product
                .original_price
                .filter(|original| *original > product.price)
                .map(|original| money(original, currency)),
            image: product.primary_image().map(ToString::to_string),
            images: product.images.clone(),
            in_stock: product.in_stock(),
        }
    }
}

/// Category link data for templates.
#[derive(Clone)]
pub struct CategoryLinkView {
    pub id: String,
    pub name: String,
}

impl From<&Category> for CategoryLinkView {
    fn from(category: &Category) -> Self {
        Self {
            id: category.id.to_string(),
            name: category.name.clone(),
        }
    }
}

/// Pagination and search query parameters.
#[derive(Debug, Deserialize)]
pub struct ListingQuery {
    pub page: Option<u32>,
    pub search: Option<String>,
}

/// Product listing page template.
#[derive(Template, WebTemplate)]
#[template(path = "products/index.html")]
pub struct ProductsIndexTemplate {
    pub nav: NavView,
    pub products: Vec<ProductView>,
    pub categories: Vec<CategoryLinkView>,
    pub search: String,
    /// Extra query string carried by pagination links.
    pub page_query: String,
    pub current_page: u32,
    pub total_pages: u32,
    pub has_more_pages: bool,
}

/// Product detail page template.
#[derive(Template, WebTemplate)]
#[template(path = "products/show.html")]
pub struct ProductShowTemplate {
    pub nav: NavView,
    pub product: ProductView,
}

/// Pagination suffix that keeps the search term.
fn page_query(search: &str) -> String {
    if search.trim().is_empty() {
        String::new()
    } else {
        format!("&search={}", urlencoding::encode(search.trim()))
    }
}

/// Display product listing page.
#[instrument(skip(state, session, auth))]
pub async fn index(
    State(state): State<AppState>,
    session: Session,
    auth: OptionalAuth,
    Query(query): Query<ListingQuery>,
) -> Result<impl IntoResponse, AppError> {
    let current_page = query.page.unwrap_or(1).max(1);
    let search = query.search.unwrap_or_default();
    let currency = state.api().currency();

    let page = state
        .api()
        .list_products(current_page, PAGE_SIZE, Some(&search))
        .await?;

    // The sidebar is optional; a category outage should not break the listing.
    let categories = match state.api().list_categories().await {
        Ok(categories) => categories.iter().map(CategoryLinkView::from).collect(),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to load categories");
            Vec::new()
        }
    };

    Ok(ProductsIndexTemplate {
        nav: NavView::load(&state, &session, auth.0.as_ref()).await,
        products: page
            .items
            .iter()
            .map(|product| ProductView::new(product, currency))
            .collect(),
        categories,
        page_query: page_query(&search),
        search,
        current_page,
        total_pages: page.total_pages,
        has_more_pages: page.has_next(),
    })
}

/// Display product detail page.
#[instrument(skip(state, session, auth))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    auth: OptionalAuth,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let product = state.api().get_product(&id).await?;

    Ok(ProductShowTemplate {
        nav: NavView::load(&state, &session, auth.0.as_ref()).await,
        product: ProductView::new(&product, state.api().currency()),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn product(price: i64, original: Option<i64>, stock: Option<u32>) -> Product {
        serde_json::from_value(serde_json::json!({
            "_id": "p1",
            "name": "Áo thun",
            "price": price,
            "originalPrice": original,
            "images": ["a.jpg"],
            "stock": stock,
        }))
        .unwrap()
    }

    #[test]
    fn test_product_view_shows_markdown_only_when_higher() {
        let view = ProductView::new(&product(150_000, Some(200_000), None), CurrencyCode::VND);
        assert_eq!(view.price, "150.000₫");
        assert_eq!(view.original_price.as_deref(), Some("200.000₫"));
        assert!(view.in_stock);
        assert_eq!(view.image.as_deref(), Some("a.jpg"));

        let view = ProductView::new(&product(150_000, Some(150_000), Some(0)), CurrencyCode::VND);
        assert!(view.original_price.is_none());
        assert!(!view.in_stock);
    }

    #[test]
    fn test_page_query_keeps_search_term() {
        assert_eq!(page_query(""), "");
        assert_eq!(page_query("  "), "");
        assert_eq!(page_query("áo thun"), "&search=%C3%A1o%20thun");
    }
}
