//! Product and category service calls (cached).

use tracing::{debug, instrument};

use crate::api::cache::{self, CacheValue};
use crate::api::types::{Category, Page, Product};
use crate::api::{ApiClient, ApiError};

impl ApiClient {
    /// Get a product by ID.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::NotFound` if the product does not exist, or another
    /// error if the request fails.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn get_product(&self, id: &str) -> Result<Product, ApiError> {
        let key = cache::product_key(id);

        if let Some(CacheValue::Product(product)) = self.inner.cache.get(&key).await {
            debug!("Cache hit for product");
            return Ok(*product);
        }

        let path = format!("products/{}", urlencoding::encode(id));
        let product: Product = self.get(&path, &[], None).await?;

        self.inner
            .cache
            .insert(key, CacheValue::Product(Box::new(product.clone())))
            .await;

        Ok(product)
    }

    /// Get a page of products, optionally filtered by a search term.
    ///
    /// Search results are not cached.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self))]
    pub async fn list_products(
        &self,
        page: u32,
        limit: u32,
        search: Option<&str>,
    ) -> Result<Page<Product>, ApiError> {
        let search = search.map(str::trim).filter(|s| !s.is_empty());
        let key = cache::products_key(page, limit);

        if search.is_none()
            && let Some(CacheValue::Products(products)) = self.inner.cache.get(&key).await
        {
            debug!("Cache hit for products");
            return Ok(products);
        }

        let mut query = vec![("page", page.to_string()), ("limit", limit.to_string())];
        if let Some(term) = search {
            query.push(("search", term.to_string()));
        }

        let products: Page<Product> = self.get("products", &query, None).await?;

        if search.is_none() {
            self.inner
                .cache
                .insert(key, CacheValue::Products(products.clone()))
                .await;
        }

        Ok(products)
    }

    /// List every category.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self))]
    pub async fn list_categories(&self) -> Result<Vec<Category>, ApiError> {
        if let Some(CacheValue::Categories(categories)) =
            self.inner.cache.get(cache::CATEGORIES_KEY).await
        {
            debug!("Cache hit for categories");
            return Ok(categories);
        }

        let categories: Vec<Category> = self.get("categories", &[], None).await?;

        self.inner
            .cache
            .insert(
                cache::CATEGORIES_KEY.to_string(),
                CacheValue::Categories(categories.clone()),
            )
            .await;

        Ok(categories)
    }

    /// Find one category in the (cached) category list.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::NotFound` if no category has this ID.
    pub async fn get_category(&self, id: &str) -> Result<Category, ApiError> {
        self.list_categories()
            .await?
            .into_iter()
            .find(|category| category.id.as_str() == id)
            .ok_or_else(|| ApiError::NotFound(format!("Category not found: {id}")))
    }

    /// Get a page of the products in one category.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self), fields(category_id = %category_id))]
    pub async fn category_products(
        &self,
        category_id: &str,
        page: u32,
        limit: u32,
    ) -> Result<Page<Product>, ApiError> {
        let key = cache::category_products_key(category_id, page, limit);

        if let Some(CacheValue::Products(products)) = self.inner.cache.get(&key).await {
            debug!("Cache hit for category products");
            return Ok(products);
        }

        let path = format!("categories/{}/products", urlencoding::encode(category_id));
        let query = [("page", page.to_string()), ("limit", limit.to_string())];
        let products: Page<Product> = self.get(&path, &query, None).await?;

        self.inner
            .cache
            .insert(key, CacheValue::Products(products.clone()))
            .await;

        Ok(products)
    }
}
