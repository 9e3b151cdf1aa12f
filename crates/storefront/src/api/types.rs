//! Wire types for the backend REST API.
//!
//! The backend speaks camelCase JSON and may key documents by `_id`.
//! Money amounts arrive as numbers (or numeric strings) and are sent back as
//! JSON numbers.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use shopfront_core::{
    CategoryId, ChatRole, DiscountPercent, OrderId, OrderStatus, PaymentMethod, ProductId, UserId,
    UserRole,
};

// =============================================================================
// Catalogue
// =============================================================================

/// A product as listed by the product service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    #[serde(alias = "_id")]
    pub id: ProductId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Decimal,
    /// Price before markdown, shown struck through.
    #[serde(default)]
    pub original_price: Option<Decimal>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub category_id: Option<CategoryId>,
    /// Units in stock, when the backend reports it.
    #[serde(default)]
    pub stock: Option<u32>,
}

impl Product {
    /// First image, used for cards and cart lines.
    #[must_use]
    pub fn primary_image(&self) -> Option<&str> {
        self.images.first().map(String::as_str)
    }

    /// Whether the product can be added to the cart.
    #[must_use]
    pub fn in_stock(&self) -> bool {
        self.stock.is_none_or(|stock| stock > 0)
    }
}

/// A product category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    #[serde(alias = "_id")]
    pub id: CategoryId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}

/// One page of a paginated listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    #[serde(alias = "products", alias = "orders", alias = "results")]
    pub items: Vec<T>,
    #[serde(default = "first_page")]
    pub page: u32,
    #[serde(default = "first_page")]
    pub total_pages: u32,
    #[serde(default)]
    pub total: u64,
}

const fn first_page() -> u32 {
    1
}

impl<T> Page<T> {
    /// Whether another page follows this one.
    #[must_use]
    pub const fn has_next(&self) -> bool {
        self.page < self.total_pages
    }
}

// =============================================================================
// Cart & coupons
// =============================================================================

/// Cart line as stored by the backend cart service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerCartItem {
    pub product_id: ProductId,
    pub name: String,
    #[serde(serialize_with = "rust_decimal::serde::float::serialize")]
    pub price: Decimal,
    #[serde(default)]
    pub image: Option<String>,
    pub quantity: u32,
}

/// Cart as stored by the backend cart service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerCart {
    #[serde(default)]
    pub items: Vec<ServerCartItem>,
    #[serde(default)]
    pub coupon_code: Option<String>,
    #[serde(default)]
    pub discount_percent: Option<DiscountPercent>,
}

/// Request body for `POST /coupons/validate`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateCouponRequest<'a> {
    pub code: &'a str,
    #[serde(serialize_with = "rust_decimal::serde::float::serialize")]
    pub subtotal: Decimal,
}

/// Coupon service verdict.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CouponValidation {
    pub valid: bool,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub discount_percent: Option<DiscountPercent>,
    #[serde(default)]
    pub message: Option<String>,
}

// =============================================================================
// Orders
// =============================================================================

/// Who receives the parcel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipient {
    pub name: String,
    pub phone: String,
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Order line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub product_id: ProductId,
    pub name: String,
    #[serde(serialize_with = "rust_decimal::serde::float::serialize")]
    pub price: Decimal,
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// An order as returned by the order service.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    #[serde(alias = "_id")]
    pub id: OrderId,
    pub recipient: Recipient,
    pub items: Vec<OrderItem>,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub status: OrderStatus,
    pub subtotal: Decimal,
    #[serde(default)]
    pub discount: Decimal,
    pub total: Decimal,
    #[serde(default)]
    pub coupon_code: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Hosted payment page for gateway payment methods.
    #[serde(default)]
    pub payment_url: Option<String>,
}

/// Request body for `POST /orders`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub recipient: Recipient,
    pub items: Vec<OrderItem>,
    pub payment_method: PaymentMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coupon_code: Option<String>,
    #[serde(serialize_with = "rust_decimal::serde::float::serialize")]
    pub subtotal: Decimal,
    #[serde(serialize_with = "rust_decimal::serde::float::serialize")]
    pub discount: Decimal,
    #[serde(serialize_with = "rust_decimal::serde::float::serialize")]
    pub total: Decimal,
}

/// Request body for `PATCH /admin/orders/{id}/status`.
#[derive(Debug, Clone, Serialize)]
pub struct UpdateOrderStatusRequest {
    pub status: OrderStatus,
}

/// Figures shown on the admin dashboard.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AdminStats {
    pub total_revenue: Decimal,
    pub total_orders: u64,
    pub total_customers: u64,
    pub total_products: u64,
    pub orders_by_status: HashMap<OrderStatus, u64>,
}

// =============================================================================
// Users
// =============================================================================

/// Account details returned by the user service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(alias = "_id")]
    pub id: UserId,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub role: UserRole,
}

/// Successful login or registration.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSession {
    #[serde(alias = "accessToken")]
    pub token: String,
    pub user: UserProfile,
}

/// Request body for `POST /auth/login`.
#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

/// Request body for `POST /auth/register`.
#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub password: &'a str,
}

// =============================================================================
// Chat
// =============================================================================

/// A stored chat message from the chat service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatHistoryMessage {
    pub role: ChatRole,
    #[serde(alias = "text")]
    pub content: String,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_product_accepts_mongo_ids_and_string_prices() {
        let product: Product = serde_json::from_str(
            r#"{"_id":"p1","name":"Ao thun","price":"150000","images":["a.jpg","b.jpg"],"stock":0}"#,
        )
        .unwrap();
        assert_eq!(product.id.as_str(), "p1");
        assert_eq!(product.price, Decimal::from(150_000));
        assert_eq!(product.primary_image(), Some("a.jpg"));
        assert!(!product.in_stock());
        assert_eq!(product.description, "");
    }

    #[test]
    fn test_page_accepts_products_key() {
        let page: Page<Category> = serde_json::from_str(
            r#"{"products":[{"id":"c1","name":"Shoes"}],"page":2,"totalPages":3}"#,
        )
        .unwrap();
        assert_eq!(page.items.len(), 1);
        assert!(page.has_next());
        assert_eq!(page.total, 0);
    }

    #[test]
    fn test_create_order_serializes_amounts_as_numbers() {
        let request = CreateOrderRequest {
            recipient: Recipient {
                name: "Nguyen Van A".to_string(),
                phone: "0912345678".to_string(),
                address: "1 Le Loi, Q1".to_string(),
                note: None,
            },
            items: vec![],
            payment_method: PaymentMethod::Cod,
            coupon_code: Some("SALE10".to_string()),
            subtotal: Decimal::from(100_000),
            discount: Decimal::from(10_000),
            total: Decimal::from(90_000),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["total"], serde_json::json!(90000.0));
        assert_eq!(json["paymentMethod"], "cod");
        assert_eq!(json["couponCode"], "SALE10");
        assert!(json["recipient"].get("note").is_none());
    }

    #[test]
    fn test_admin_stats_status_map() {
        let stats: AdminStats = serde_json::from_str(
            r#"{"totalRevenue":1200000,"totalOrders":4,"ordersByStatus":{"pending":3,"delivered":1}}"#,
        )
        .unwrap();
        assert_eq!(stats.orders_by_status.get(&OrderStatus::Pending), Some(&3));
        assert_eq!(stats.total_customers, 0);
    }
}
