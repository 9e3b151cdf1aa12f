//! Category route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
};
use tower_sessions::Session;
use tracing::instrument;

use crate::api::types::Category;
use crate::error::AppError;
use crate::filters;
use crate::middleware::OptionalAuth;
use crate::routes::products::{ListingQuery, ProductView};
use crate::routes::{NavView, PAGE_SIZE};
use crate::state::AppState;

/// Category display data for templates.
#[derive(Clone)]
pub struct CategoryView {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub image: Option<String>,
}

impl From<&Category> for CategoryView {
    fn from(category: &Category) -> Self {
        Self {
            id: category.id.to_string(),
            name: category.name.clone(),
            description: category.description.clone(),
            image: category.image.clone(),
        }
    }
}

/// Category listing page template.
#[derive(Template, WebTemplate)]
#[template(path = "categories/index.html")]
pub struct CategoriesIndexTemplate {
    pub nav: NavView,
    pub categories: Vec<CategoryView>,
}

/// Category products page template.
#[derive(Template, WebTemplate)]
#[template(path = "categories/show.html")]
pub struct CategoryShowTemplate {
    pub nav: NavView,
    pub category: CategoryView,
    pub products: Vec<ProductView>,
    /// Extra query string carried by pagination links.
    pub page_query: String,
    pub current_page: u32,
    pub total_pages: u32,
    pub has_more_pages: bool,
}

/// Display every category.
#[instrument(skip(state, session, auth))]
pub async fn index(
    State(state): State<AppState>,
    session: Session,
    auth: OptionalAuth,
) -> Result<impl IntoResponse, AppError> {
    let categories = state.api().list_categories().await?;

    Ok(CategoriesIndexTemplate {
        nav: NavView::load(&state, &session, auth.0.as_ref()).await,
        categories: categories.iter().map(CategoryView::from).collect(),
    })
}

/// Display the products in one category.
#[instrument(skip(state, session, auth))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    auth: OptionalAuth,
    Path(id): Path<String>,
    Query(query): Query<ListingQuery>,
) -> Result<impl IntoResponse, AppError> {
    let current_page = query.page.unwrap_or(1).max(1);
    let currency = state.api().currency();

    let category = state.api().get_category(&id).await?;
    let page = state
        .api()
        .category_products(&id, current_page, PAGE_SIZE)
        .await?;

    Ok(CategoryShowTemplate {
        nav: NavView::load(&state, &session, auth.0.as_ref()).await,
        category: CategoryView::from(&category),
        products: page
            .items
            .iter()
            .map(|product| ProductView::new(product, currency))
            .collect(),
        page_query: String::new(),
        current_page,
        total_pages: page.total_pages,
        has_more_pages: page.has_next(),
    })
}
