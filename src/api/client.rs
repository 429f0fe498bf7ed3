//! API client for communicating with the MedCart backend REST API.
//!
//! This module provides the `ApiClient` struct. Every operation composes an
//! HTTP call with its cache side effect: reads go through the read-through
//! strategy and fall back to the cache when the network fails; writes update
//! the cache on success and always surface their errors.

use std::time::Duration;

use chrono::Utc;
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::auth::SessionData;
use crate::cache::strategy::{self, Fetched};
use crate::cache::{CachePartition, CacheStore, Entity};
use crate::config::Config;
use crate::models::{
    Address, NewOrder, NewProduct, Order, OrderStatus, Product, ProductPatch, Role, Seller,
    SellerStatus, User, UserPatch,
};

use super::ApiError;

/// HTTP request timeout in seconds.
/// 30s allows for slow API responses while failing fast enough for good UX.
const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: String,
    user: LoginUser,
}

#[derive(Debug, Deserialize)]
struct LoginUser {
    #[serde(alias = "_id")]
    id: String,
    name: String,
    email: String,
    role: Role,
    #[serde(default)]
    region: Option<String>,
    #[serde(rename = "shippingAddress", default)]
    shipping_address: Option<Address>,
}

/// API client for the MedCart backend.
/// Clone is cheap - reqwest::Client and the cache handle use Arc internally.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
    cache: CacheStore,
}

impl ApiClient {
    /// Create a new API client against `base_url`, mirroring entities into
    /// `cache`.
    pub fn new(base_url: impl Into<String>, cache: CacheStore) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
            cache,
        })
    }

    /// Create a client from the application config, degrading to an
    /// in-memory cache when the on-disk one cannot be opened.
    pub fn with_config(config: &Config) -> anyhow::Result<Self> {
        let cache_path = config.cache_dir()?.join("cache.db");
        let cache = match CacheStore::open(&cache_path) {
            Ok(cache) => cache,
            Err(e) => {
                warn!(path = %cache_path.display(), error = %e, "cache unavailable, using in-memory store");
                CacheStore::ephemeral()?
            }
        };
        Ok(Self::new(config.api_base_url(), cache)?)
    }

    /// Set the bearer token for authenticated requests
    pub fn set_token(&mut self, token: String) {
        self.token = Some(token);
    }

    /// Create a new ApiClient with the given token, sharing the connection
    /// pool and cache handle.
    pub fn with_token(&self, token: String) -> Self {
        Self {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            token: Some(token),
            cache: self.cache.clone(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Open the cache partition for an entity type, degrading to None
    /// ("cache unavailable") instead of failing the request.
    fn partition<T: Entity>(&self) -> Option<CachePartition<T>> {
        match self.cache.partition::<T>() {
            Ok(partition) => Some(partition),
            Err(e) => {
                debug!(store = T::store_name(), error = %e, "cache partition unavailable");
                None
            }
        }
    }

    /// Best-effort merge of changed fields into the cached record.
    fn merge_cached<T: Entity>(&self, id: &str, patch: serde_json::Value) -> Option<T> {
        let partition = self.partition::<T>()?;
        match partition.merge(id, &patch) {
            Ok(merged) => merged,
            Err(e) => {
                debug!(store = T::store_name(), id, error = %e, "cache merge failed");
                None
            }
        }
    }

    fn cache_put<T: Entity>(&self, record: &T) {
        if let Some(partition) = self.partition::<T>() {
            if let Err(e) = partition.put(record) {
                debug!(store = T::store_name(), error = %e, "cache write failed");
            }
        }
    }

    fn cache_delete<T: Entity>(&self, id: &str) {
        if let Some(partition) = self.partition::<T>() {
            if let Err(e) = partition.delete(id) {
                debug!(store = T::store_name(), id, error = %e, "cache delete failed");
            }
        }
    }

    // ===== HTTP plumbing =====

    fn request(&self, method: Method, url: &str) -> reqwest::RequestBuilder {
        let mut request = self.client.request(method, url);
        if let Some(ref token) = self.token {
            request = request.bearer_auth(token);
        }
        request
    }

    /// Check if response is successful, returning a typed error with the
    /// server's message if not.
    async fn check(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    async fn parse<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| ApiError::InvalidResponse(e.to_string()))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, ApiError> {
        let response = self.request(Method::GET, url).send().await?;
        Self::parse(Self::check(response).await?).await
    }

    async fn post_json<T, B>(&self, url: &str, body: &B) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let response = self.request(Method::POST, url).json(body).send().await?;
        Self::parse(Self::check(response).await?).await
    }

    /// PUT where only success matters; the response body is ignored.
    async fn put_ack<B>(&self, url: &str, body: &B) -> Result<(), ApiError>
    where
        B: Serialize + ?Sized,
    {
        let response = self.request(Method::PUT, url).json(body).send().await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn send_delete(&self, url: &str) -> Result<(), ApiError> {
        let response = self.request(Method::DELETE, url).send().await?;
        Self::check(response).await?;
        Ok(())
    }

    // ===== Auth =====

    /// Authenticate and build the session attached to subsequent calls.
    pub async fn login(&self, email: &str, password: &str) -> Result<SessionData, ApiError> {
        let url = self.url("/users/login");
        let response: LoginResponse = self
            .post_json(&url, &serde_json::json!({"email": email, "password": password}))
            .await?;

        Ok(SessionData {
            token: response.token,
            user_id: response.user.id,
            role: response.user.role,
            name: response.user.name,
            email: response.user.email,
            region: response.user.region,
            shipping_address: response.user.shipping_address,
            created_at: Utc::now(),
        })
    }

    // ===== Products =====

    /// Fetch the full catalog.
    pub async fn list_products(&self) -> Result<Fetched<Vec<Product>>, ApiError> {
        let url = self.url("/products");
        let products = self.partition::<Product>();
        strategy::fetch_list(products.as_ref(), || self.get_json(&url)).await
    }

    /// Fetch the catalog for one category.
    pub async fn products_by_category(
        &self,
        category: &str,
    ) -> Result<Fetched<Vec<Product>>, ApiError> {
        let url = self.url(&format!("/products/category/{}", category));
        let products = self.partition::<Product>();
        strategy::fetch_related(
            products.as_ref(),
            |p: &Product| p.category == category,
            || self.get_json(&url),
        )
        .await
    }

    /// Fetch one seller's catalog (seller dashboard).
    pub async fn products_by_seller(
        &self,
        seller_id: &str,
    ) -> Result<Fetched<Vec<Product>>, ApiError> {
        let url = self.url(&format!("/products/seller/{}", seller_id));
        let products = self.partition::<Product>();
        strategy::fetch_related(
            products.as_ref(),
            |p: &Product| p.seller_id.as_deref() == Some(seller_id),
            || self.get_json(&url),
        )
        .await
    }

    pub async fn get_product(&self, id: &str) -> Result<Fetched<Product>, ApiError> {
        let url = self.url(&format!("/products/{}", id));
        let products = self.partition::<Product>();
        strategy::fetch_one(products.as_ref(), id, || self.get_json(&url)).await
    }

    /// Create a product. No optimistic local creation: the server assigns
    /// the id, and only its response is cached.
    pub async fn create_product(&self, new: &NewProduct) -> Result<Product, ApiError> {
        let url = self.url("/products");
        let created: Product = self.post_json(&url, new).await?;
        self.cache_put(&created);
        Ok(created)
    }

    /// Update a product's changed fields. Returns the merged cached record
    /// when the cache is available.
    pub async fn update_product(
        &self,
        id: &str,
        patch: &ProductPatch,
    ) -> Result<Option<Product>, ApiError> {
        let url = self.url(&format!("/products/{}", id));
        self.put_ack(&url, patch).await?;
        Ok(self.apply_patch::<Product, _>(id, patch))
    }

    pub async fn delete_product(&self, id: &str) -> Result<(), ApiError> {
        let url = self.url(&format!("/products/{}", id));
        self.send_delete(&url).await?;
        self.cache_delete::<Product>(id);
        Ok(())
    }

    // ===== Orders =====

    /// Fetch every order (super-admin view).
    pub async fn list_orders(&self) -> Result<Fetched<Vec<Order>>, ApiError> {
        let url = self.url("/orders");
        let orders = self.partition::<Order>();
        strategy::fetch_list(orders.as_ref(), || self.get_json(&url)).await
    }

    /// Fetch one customer's orders.
    pub async fn orders_by_user(&self, user_id: &str) -> Result<Fetched<Vec<Order>>, ApiError> {
        let url = self.url(&format!("/orders/user/{}", user_id));
        let orders = self.partition::<Order>();
        strategy::fetch_related(
            orders.as_ref(),
            |o: &Order| o.user_id == user_id,
            || self.get_json(&url),
        )
        .await
    }

    /// Fetch the orders routed to one seller.
    pub async fn orders_by_seller(&self, seller_id: &str) -> Result<Fetched<Vec<Order>>, ApiError> {
        let url = self.url(&format!("/orders/seller/{}", seller_id));
        let orders = self.partition::<Order>();
        strategy::fetch_related(
            orders.as_ref(),
            |o: &Order| o.seller_id.as_deref() == Some(seller_id),
            || self.get_json(&url),
        )
        .await
    }

    /// Fetch the orders for one region (regional-admin dashboard).
    pub async fn orders_by_region(&self, region: &str) -> Result<Fetched<Vec<Order>>, ApiError> {
        let url = self.url(&format!("/orders/region/{}", region));
        let orders = self.partition::<Order>();
        strategy::fetch_related(
            orders.as_ref(),
            |o: &Order| o.region.as_deref() == Some(region),
            || self.get_json(&url),
        )
        .await
    }

    pub async fn get_order(&self, id: &str) -> Result<Fetched<Order>, ApiError> {
        let url = self.url(&format!("/orders/{}", id));
        let orders = self.partition::<Order>();
        strategy::fetch_one(orders.as_ref(), id, || self.get_json(&url)).await
    }

    /// Place an order. The server assigns the id, initial status, and
    /// seller/region routing; its response is cached.
    pub async fn place_order(&self, new: &NewOrder) -> Result<Order, ApiError> {
        let url = self.url("/orders");
        let placed: Order = self.post_json(&url, new).await?;
        self.cache_put(&placed);
        Ok(placed)
    }

    /// Move an order along its status lifecycle.
    ///
    /// The transition is validated against the status state machine before
    /// any network call; an illegal request errors immediately with no
    /// request sent and no cache write. On success the change is merged
    /// into the cached record, preserving every other field.
    pub async fn update_order_status(
        &self,
        order: &Order,
        next: OrderStatus,
        description: &str,
    ) -> Result<Option<Order>, ApiError> {
        if !order.status.can_transition_to(next) {
            return Err(ApiError::IllegalTransition {
                from: order.status.to_string(),
                to: next.to_string(),
            });
        }

        let url = self.url(&format!("/orders/status/{}", order.id));
        self.put_ack(&url, &serde_json::json!({"status": next, "description": description}))
            .await?;

        Ok(self.merge_cached::<Order>(
            &order.id,
            serde_json::json!({"status": next, "statusDescription": description}),
        ))
    }

    pub async fn delete_order(&self, id: &str) -> Result<(), ApiError> {
        let url = self.url(&format!("/orders/{}", id));
        self.send_delete(&url).await?;
        self.cache_delete::<Order>(id);
        Ok(())
    }

    // ===== Users =====

    pub async fn list_users(&self) -> Result<Fetched<Vec<User>>, ApiError> {
        let url = self.url("/users");
        let users = self.partition::<User>();
        strategy::fetch_list(users.as_ref(), || self.get_json(&url)).await
    }

    pub async fn get_user(&self, id: &str) -> Result<Fetched<User>, ApiError> {
        let url = self.url(&format!("/users/{}", id));
        let users = self.partition::<User>();
        strategy::fetch_one(users.as_ref(), id, || self.get_json(&url)).await
    }

    /// Update a profile's changed fields. Returns the merged cached record
    /// when the cache is available.
    pub async fn update_user(
        &self,
        id: &str,
        patch: &UserPatch,
    ) -> Result<Option<User>, ApiError> {
        let url = self.url(&format!("/users/{}", id));
        self.put_ack(&url, patch).await?;
        Ok(self.apply_patch::<User, _>(id, patch))
    }

    pub async fn delete_user(&self, id: &str) -> Result<(), ApiError> {
        let url = self.url(&format!("/users/{}", id));
        self.send_delete(&url).await?;
        self.cache_delete::<User>(id);
        Ok(())
    }

    // ===== Sellers =====

    pub async fn list_sellers(&self) -> Result<Fetched<Vec<Seller>>, ApiError> {
        let url = self.url("/sellers");
        let sellers = self.partition::<Seller>();
        strategy::fetch_list(sellers.as_ref(), || self.get_json(&url)).await
    }

    /// Fetch the approval queue (regional-admin and super-admin dashboards).
    pub async fn pending_sellers(&self) -> Result<Fetched<Vec<Seller>>, ApiError> {
        let url = self.url("/sellers/pending");
        let sellers = self.partition::<Seller>();
        strategy::fetch_related(
            sellers.as_ref(),
            |s: &Seller| s.status == SellerStatus::Pending,
            || self.get_json(&url),
        )
        .await
    }

    pub async fn get_seller(&self, id: &str) -> Result<Fetched<Seller>, ApiError> {
        let url = self.url(&format!("/sellers/{}", id));
        let sellers = self.partition::<Seller>();
        strategy::fetch_one(sellers.as_ref(), id, || self.get_json(&url)).await
    }

    /// Approve a pending seller, staging "approving" on the in-memory list
    /// while the request is in flight and rolling back to the prior status
    /// if it fails.
    pub async fn approve_seller(
        &self,
        sellers: &mut [Seller],
        id: &str,
    ) -> Result<(), ApiError> {
        strategy::optimistic_transition(
            sellers,
            id,
            SellerStatus::Approving,
            SellerStatus::Approved,
            || self.set_seller_status(id, SellerStatus::Approved),
        )
        .await
    }

    /// Reject a pending seller; the optimistic mirror of `approve_seller`.
    pub async fn reject_seller(&self, sellers: &mut [Seller], id: &str) -> Result<(), ApiError> {
        strategy::optimistic_transition(
            sellers,
            id,
            SellerStatus::Rejecting,
            SellerStatus::Rejected,
            || self.set_seller_status(id, SellerStatus::Rejected),
        )
        .await
    }

    /// The seller status-transition request. Only terminal statuses are ever
    /// requested; the intermediates belong to the optimistic strategy and
    /// never reach the wire.
    async fn set_seller_status(&self, id: &str, status: SellerStatus) -> Result<(), ApiError> {
        let url = self.url(&format!("/sellers/status/{}", id));
        self.put_ack(&url, &serde_json::json!({"status": status}))
            .await?;
        let _ = self.merge_cached::<Seller>(id, serde_json::json!({"status": status}));
        Ok(())
    }

    // ===== Cached snapshots =====

    /// Cached records for instant first paint, read before a refetch
    /// completes. Views render this (possibly empty) snapshot immediately,
    /// then replace it with the result of the matching fetch operation.
    /// Empty when the cache is unavailable or never populated.
    pub fn cached<T: Entity>(&self) -> Vec<T> {
        let Some(partition) = self.partition::<T>() else {
            return Vec::new();
        };
        match partition.get_all() {
            Ok(records) => records,
            Err(e) => {
                debug!(store = T::store_name(), error = %e, "cache read failed");
                Vec::new()
            }
        }
    }

    /// `cached` restricted to records matching `predicate` (e.g. one user's
    /// orders).
    pub fn cached_filtered<T: Entity>(&self, predicate: impl Fn(&T) -> bool) -> Vec<T> {
        let Some(partition) = self.partition::<T>() else {
            return Vec::new();
        };
        match partition.get_filtered(predicate) {
            Ok(records) => records,
            Err(e) => {
                debug!(store = T::store_name(), error = %e, "cache read failed");
                Vec::new()
            }
        }
    }

    // ===== Cache warm-up =====

    /// Fetch every collection concurrently to populate the cache, e.g.
    /// before going offline. Collections the current role cannot read just
    /// log their failure.
    pub async fn warm_cache(&self) {
        let (products, orders, users, sellers) = tokio::join!(
            self.list_products(),
            self.list_orders(),
            self.list_users(),
            self.list_sellers(),
        );

        let outcomes = [
            ("products", products.map(|_| ()).err()),
            ("orders", orders.map(|_| ()).err()),
            ("users", users.map(|_| ()).err()),
            ("sellers", sellers.map(|_| ()).err()),
        ];
        for (store, err) in outcomes {
            match err {
                None => debug!(store, "cache warmed"),
                Some(e) => warn!(store, error = %e, "cache warm fetch failed"),
            }
        }
    }

    fn apply_patch<T: Entity, P: Serialize>(&self, id: &str, patch: &P) -> Option<T> {
        let patch_value = match serde_json::to_value(patch) {
            Ok(value) => value,
            Err(e) => {
                debug!(store = T::store_name(), id, error = %e, "patch not representable as JSON");
                return None;
            }
        };
        self.merge_cached::<T>(id, patch_value)
    }
}
