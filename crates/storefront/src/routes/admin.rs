//! Admin dashboard route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use shopfront_core::{CurrencyCode, OrderStatus};
use tower_sessions::Session;
use tracing::instrument;

use crate::api::ApiError;
use crate::api::types::AdminStats;
use crate::error::AppError;
use crate::filters;
use crate::middleware::RequireAdmin;
use crate::routes::orders::OrderView;
use crate::routes::{NavView, money, set_flash};
use crate::state::AppState;

/// Dashboard headline figures.
#[derive(Debug, Clone)]
pub struct DashboardMetrics {
    pub revenue: String,
    pub orders: u64,
    pub customers: u64,
    pub products: u64,
}

impl DashboardMetrics {
    fn new(stats: &AdminStats, currency: CurrencyCode) -> Self {
        Self {
            revenue: money(stats.total_revenue, currency),
            orders: stats.total_orders,
            customers: stats.total_customers,
            products: stats.total_products,
        }
    }
}

/// Order count for one status, doubling as a filter link.
#[derive(Debug, Clone)]
pub struct StatusCountView {
    pub status: OrderStatus,
    pub label: &'static str,
    pub count: u64,
    pub selected: bool,
}

fn status_counts(stats: &AdminStats, selected: Option<OrderStatus>) -> Vec<StatusCountView> {
    OrderStatus::ALL
        .into_iter()
        .map(|status| StatusCountView {
            status,
            label: status.label(),
            count: stats.orders_by_status.get(&status).copied().unwrap_or(0),
            selected: selected == Some(status),
        })
        .collect()
}

/// Dashboard query parameters.
#[derive(Debug, Deserialize)]
pub struct DashboardQuery {
    pub status: Option<String>,
}

/// Dashboard template.
#[derive(Template, WebTemplate)]
#[template(path = "admin/dashboard.html")]
pub struct DashboardTemplate {
    pub nav: NavView,
    pub metrics: DashboardMetrics,
    pub status_counts: Vec<StatusCountView>,
    pub filter: Option<OrderStatus>,
    pub recent_orders: Vec<OrderView>,
    pub statuses: [OrderStatus; 5],
}

/// Display the admin dashboard.
#[instrument(skip(state, session, admin))]
pub async fn dashboard(
    State(state): State<AppState>,
    session: Session,
    RequireAdmin(admin): RequireAdmin,
    Query(query): Query<DashboardQuery>,
) -> Result<impl IntoResponse, AppError> {
    // An unknown filter value shows every order.
    let filter = query
        .status
        .as_deref()
        .filter(|s| !s.is_empty())
        .and_then(|s| s.parse::<OrderStatus>().ok());
    let currency = state.api().currency();

    let (stats, orders) = tokio::try_join!(
        state.api().admin_stats(&admin.token),
        state.api().admin_orders(&admin.token, filter, 1),
    )?;

    Ok(DashboardTemplate {
        nav: NavView::load(&state, &session, Some(&admin)).await,
        metrics: DashboardMetrics::new(&stats, currency),
        status_counts: status_counts(&stats, filter),
        filter,
        recent_orders: orders
            .items
            .iter()
            .map(|order| OrderView::new(order, currency))
            .collect(),
        statuses: OrderStatus::ALL,
    })
}

/// Status change form data.
#[derive(Debug, Deserialize)]
pub struct UpdateStatusForm {
    pub status: String,
}

/// Move an order to a new status.
#[instrument(skip(state, session, admin, form))]
pub async fn update_status(
    State(state): State<AppState>,
    session: Session,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<String>,
    Form(form): Form<UpdateStatusForm>,
) -> Result<Response, AppError> {
    let status: OrderStatus = form
        .status
        .parse()
        .map_err(|_| AppError::BadRequest(format!("Unknown order status: {}", form.status)))?;

    match state
        .api()
        .admin_update_status(&admin.token, &id, status)
        .await
    {
        Ok(order) => {
            tracing::info!(order_id = %order.id, status = %status, admin_id = %admin.id, "Order status updated");
            set_flash(
                &session,
                format!("Order {} is now {}", order.id, status.label()),
            )
            .await;
        }
        Err(ApiError::Rejected(message)) => set_flash(&session, message).await,
        Err(e) => return Err(e.into()),
    }

    Ok(Redirect::to("/admin").into_response())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use rust_decimal::Decimal;

    use super::*;

    #[test]
    fn test_status_counts_cover_every_status_in_order() {
        let stats = AdminStats {
            total_revenue: Decimal::from(1_500_000),
            total_orders: 4,
            orders_by_status: HashMap::from([
                (OrderStatus::Pending, 3),
                (OrderStatus::Delivered, 1),
            ]),
            ..AdminStats::default()
        };

        let counts = status_counts(&stats, Some(OrderStatus::Pending));
        assert_eq!(counts.len(), 5);
        assert_eq!(counts[0].status, OrderStatus::Pending);
        assert_eq!(counts[0].count, 3);
        assert!(counts[0].selected);
        assert_eq!(counts[1].count, 0);
        assert!(!counts[1].selected);
        assert_eq!(counts[3].count, 1);
    }

    #[test]
    fn test_metrics_format_revenue() {
        let stats = AdminStats {
            total_revenue: Decimal::from(1_500_000),
            ..AdminStats::default()
        };
        let metrics = DashboardMetrics::new(&stats, CurrencyCode::VND);
        assert_eq!(metrics.revenue, "1.500.000₫");
    }
}
