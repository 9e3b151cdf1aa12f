//! Cache types for catalogue responses.

use crate::api::types::{Category, Page, Product};

/// Cached value types.
#[derive(Debug, Clone)]
pub enum CacheValue {
    Product(Box<Product>),
    Products(Page<Product>),
    Categories(Vec<Category>),
}

/// Cache key for a single product.
pub fn product_key(id: &str) -> String {
    format!("product:{id}")
}

/// Cache key for a page of the full listing.
pub fn products_key(page: u32, limit: u32) -> String {
    format!("products:{page}:{limit}")
}

/// Cache key for a page of one category.
pub fn category_products_key(category_id: &str, page: u32, limit: u32) -> String {
    format!("category:{category_id}:{page}:{limit}")
}

/// Cache key for the category list.
pub const CATEGORIES_KEY: &str = "categories";
