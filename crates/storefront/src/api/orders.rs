//! Order service calls, including the admin views.

use reqwest::Method;
use tracing::instrument;

use shopfront_core::OrderStatus;

use crate::api::types::{AdminStats, CreateOrderRequest, Order, Page, UpdateOrderStatusRequest};
use crate::api::{ApiClient, ApiError};

impl ApiClient {
    /// Place an order.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Rejected` when the backend refuses the order (stock,
    /// coupon, validation), or another error if the request fails.
    #[instrument(skip(self, token, request), fields(lines = request.items.len()))]
    pub async fn create_order(
        &self,
        token: Option<&str>,
        request: &CreateOrderRequest,
    ) -> Result<Order, ApiError> {
        self.send(Method::POST, "orders", Some(request), token).await
    }

    /// The signed-in customer's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, token))]
    pub async fn list_my_orders(&self, token: &str) -> Result<Vec<Order>, ApiError> {
        let mut orders: Vec<Order> = self.get("orders/me", &[], Some(token)).await?;
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    /// One order belonging to the signed-in customer.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::NotFound` if the order does not exist or is not visible
    /// to this customer.
    #[instrument(skip(self, token))]
    pub async fn get_order(&self, token: &str, id: &str) -> Result<Order, ApiError> {
        let path = format!("orders/{}", urlencoding::encode(id));
        self.get(&path, &[], Some(token)).await
    }

    /// Cancel an order.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Rejected` if the order can no longer be cancelled.
    #[instrument(skip(self, token))]
    pub async fn cancel_order(&self, token: &str, id: &str) -> Result<Order, ApiError> {
        let path = format!("orders/{}/cancel", urlencoding::encode(id));
        self.send::<(), _>(Method::POST, &path, None, Some(token))
            .await
    }

    /// Dashboard figures.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, token))]
    pub async fn admin_stats(&self, token: &str) -> Result<AdminStats, ApiError> {
        self.get("admin/stats", &[], Some(token)).await
    }

    /// Most recent orders, optionally filtered by status.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, token))]
    pub async fn admin_orders(
        &self,
        token: &str,
        status: Option<OrderStatus>,
        page: u32,
    ) -> Result<Page<Order>, ApiError> {
        let mut query = vec![("page", page.to_string())];
        if let Some(status) = status {
            query.push(("status", status.as_str().to_string()));
        }
        self.get("admin/orders", &query, Some(token)).await
    }

    /// Move an order to a new status.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Rejected` for a transition the backend refuses.
    #[instrument(skip(self, token))]
    pub async fn admin_update_status(
        &self,
        token: &str,
        id: &str,
        status: OrderStatus,
    ) -> Result<Order, ApiError> {
        let path = format!("admin/orders/{}/status", urlencoding::encode(id));
        let body = UpdateOrderStatusRequest { status };
        self.send(Method::PATCH, &path, Some(&body), Some(token))
            .await
    }
}
