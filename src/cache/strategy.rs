//! The two data-access strategies used by the API client.
//!
//! - Read-through cache (`fetch_list`, `fetch_related`, `fetch_one`):
//!   serve the network result and reconcile the cache on success, fall back
//!   to the cache tagged stale on failure.
//! - Optimistic mutation with rollback (`optimistic_transition`): show an
//!   intermediate status while the request is in flight, advance on success,
//!   roll back on failure.
//!
//! They are deliberately kept as two distinct, named strategies; the seller
//! approval queue is the only optimistic call site.

use std::future::Future;

use tracing::{debug, warn};

use super::store::{CachePartition, Entity};

/// Where a fetch result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    /// Fresh data from the network.
    Network,
    /// Cached data served because the network fetch failed; may be stale.
    CacheFallback,
}

/// A fetch result tagged with its origin, so callers can render a staleness
/// indicator instead of mistaking cached data for fresh.
#[derive(Debug, Clone)]
pub struct Fetched<T> {
    pub data: T,
    pub source: DataSource,
}

impl<T> Fetched<T> {
    pub fn fresh(data: T) -> Self {
        Self {
            data,
            source: DataSource::Network,
        }
    }

    pub fn stale(data: T) -> Self {
        Self {
            data,
            source: DataSource::CacheFallback,
        }
    }

    pub fn is_stale(&self) -> bool {
        self.source == DataSource::CacheFallback
    }

    pub fn into_inner(self) -> T {
        self.data
    }
}

/// Read-through fetch of a complete collection.
///
/// On success the partition is reconciled to mirror the response exactly,
/// unless a local write landed while the fetch was in flight - then the
/// response is already outdated and its cache write is skipped, so a slow
/// refetch cannot resurrect a deleted record or drop one created mid-flight.
/// On failure the partition contents are served tagged stale; a partition
/// that has never synchronized propagates the fetch error instead.
///
/// `partition` is None when the cache is unavailable; the fetch then runs
/// uncached.
pub async fn fetch_list<T, E, F, Fut>(
    partition: Option<&CachePartition<T>>,
    fetcher: F,
) -> Result<Fetched<Vec<T>>, E>
where
    T: Entity,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Vec<T>, E>>,
{
    let Some(partition) = partition else {
        return fetcher().await.map(Fetched::fresh);
    };

    let generation = partition.generation();
    match fetcher().await {
        Ok(records) => {
            if partition.generation() == generation {
                if let Err(e) = partition.replace_all(&records) {
                    debug!(store = T::store_name(), error = %e, "cache reconcile failed");
                } else if let Err(e) = partition.mark_refreshed() {
                    debug!(store = T::store_name(), error = %e, "failed to record refresh time");
                }
            } else {
                debug!(
                    store = T::store_name(),
                    "partition changed during refetch, skipping cache write"
                );
            }
            Ok(Fetched::fresh(records))
        }
        Err(err) => serve_cached(partition, err, |p| p.get_all()),
    }
}

/// Read-through fetch of a relation-filtered subset (orders for one user,
/// products of one seller). Reconciles by merge only - replacing the whole
/// partition with a subset would delete every other caller's records - and
/// falls back to the cached records matching `predicate`.
pub async fn fetch_related<T, E, P, F, Fut>(
    partition: Option<&CachePartition<T>>,
    predicate: P,
    fetcher: F,
) -> Result<Fetched<Vec<T>>, E>
where
    T: Entity,
    P: Fn(&T) -> bool,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Vec<T>, E>>,
{
    let Some(partition) = partition else {
        return fetcher().await.map(Fetched::fresh);
    };

    let generation = partition.generation();
    match fetcher().await {
        Ok(records) => {
            if partition.generation() == generation {
                if let Err(e) = partition.put_all(&records) {
                    debug!(store = T::store_name(), error = %e, "cache reconcile failed");
                } else if let Err(e) = partition.mark_refreshed() {
                    debug!(store = T::store_name(), error = %e, "failed to record refresh time");
                }
            } else {
                debug!(
                    store = T::store_name(),
                    "partition changed during refetch, skipping cache write"
                );
            }
            Ok(Fetched::fresh(records))
        }
        Err(err) => serve_cached(partition, err, |p| p.get_filtered(&predicate)),
    }
}

/// Read-through fetch of a single record by id. Falls back to the cached
/// record when the network fails; a cache miss propagates the fetch error.
pub async fn fetch_one<T, E, F, Fut>(
    partition: Option<&CachePartition<T>>,
    id: &str,
    fetcher: F,
) -> Result<Fetched<T>, E>
where
    T: Entity,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let Some(partition) = partition else {
        return fetcher().await.map(Fetched::fresh);
    };

    match fetcher().await {
        Ok(record) => {
            if let Err(e) = partition.put(&record) {
                debug!(store = T::store_name(), error = %e, "cache write failed");
            }
            Ok(Fetched::fresh(record))
        }
        Err(err) => match partition.get(id) {
            Ok(Some(record)) => {
                warn!(store = T::store_name(), id, "network fetch failed, serving cached record");
                Ok(Fetched::stale(record))
            }
            Ok(None) => Err(err),
            Err(cache_err) => {
                debug!(store = T::store_name(), error = %cache_err, "cache fallback failed");
                Err(err)
            }
        },
    }
}

fn serve_cached<T, E>(
    partition: &CachePartition<T>,
    err: E,
    read: impl FnOnce(&CachePartition<T>) -> Result<Vec<T>, super::store::CacheError>,
) -> Result<Fetched<Vec<T>>, E>
where
    T: Entity,
{
    if partition.cached_at().is_none() {
        // Never synchronized: an empty fallback would be indistinguishable
        // from a legitimately empty collection.
        return Err(err);
    }
    match read(partition) {
        Ok(records) => {
            warn!(
                store = T::store_name(),
                count = records.len(),
                "network fetch failed, serving cached data"
            );
            Ok(Fetched::stale(records))
        }
        Err(cache_err) => {
            debug!(store = T::store_name(), error = %cache_err, "cache fallback failed");
            Err(err)
        }
    }
}

/// An item in an in-memory list whose status the optimistic strategy can
/// stage and roll back.
pub trait StatusItem {
    type Status: Clone;

    fn item_id(&self) -> &str;
    fn status(&self) -> Self::Status;
    fn set_status(&mut self, status: Self::Status);
}

/// Optimistic mutation with rollback.
///
/// Sets `intermediate` on the matching item before awaiting `op`, advances
/// to `terminal` when it succeeds, and restores the prior status when it
/// fails. When no item matches `id` the operation still runs, without any
/// local staging.
pub async fn optimistic_transition<T, E, F, Fut>(
    items: &mut [T],
    id: &str,
    intermediate: T::Status,
    terminal: T::Status,
    op: F,
) -> Result<(), E>
where
    T: StatusItem,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<(), E>>,
{
    let Some(pos) = items.iter().position(|item| item.item_id() == id) else {
        return op().await;
    };

    let prior = items[pos].status();
    items[pos].set_status(intermediate);
    match op().await {
        Ok(()) => {
            items[pos].set_status(terminal);
            Ok(())
        }
        Err(err) => {
            items[pos].set_status(prior);
            Err(err)
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheStore;
    use crate::models::{Order, OrderStatus, PaymentMethod, Product, Seller, SellerStatus};

    fn product(id: &str, name: &str, price: f64) -> Product {
        Product {
            id: id.to_string(),
            name: name.to_string(),
            description: None,
            category: "pain-relief".to_string(),
            price,
            stock: 5,
            image_url: None,
            seller_id: None,
            created_at: None,
        }
    }

    fn order(id: &str, user_id: &str) -> Order {
        Order {
            id: id.to_string(),
            user_id: user_id.to_string(),
            seller_id: None,
            items: vec![],
            shipping_address: None,
            payment_method: PaymentMethod::Cod,
            status: OrderStatus::Pending,
            status_description: None,
            region: None,
            total: 0.0,
            created_at: None,
        }
    }

    fn seller(id: &str, status: SellerStatus) -> Seller {
        Seller {
            id: id.to_string(),
            name: "Ravi".to_string(),
            email: "ravi@pharma.in".to_string(),
            store_name: None,
            region: None,
            status,
            created_at: None,
        }
    }

    fn open_store() -> (tempfile::TempDir, CacheStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::open(dir.path().join("cache")).unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn test_fetch_list_populates_cache_exactly() {
        let (_dir, store) = open_store();
        let products = store.partition::<Product>().unwrap();

        let result = fetch_list(Some(&products), || async {
            Ok::<_, &str>(vec![product("p1", "Aspirin", 10.0)])
        })
        .await
        .unwrap();

        assert!(!result.is_stale());
        assert_eq!(result.data.len(), 1);

        let cached = products.get_all().unwrap();
        assert_eq!(cached.len(), 1);
        assert_eq!(cached[0].id, "p1");
        assert_eq!(cached[0].name, "Aspirin");
        assert_eq!(cached[0].price, 10.0);
    }

    #[tokio::test]
    async fn test_fetch_list_falls_back_to_cache_on_failure() {
        let (_dir, store) = open_store();
        let products = store.partition::<Product>().unwrap();

        fetch_list(Some(&products), || async {
            Ok::<_, &str>(vec![product("p1", "Aspirin", 10.0)])
        })
        .await
        .unwrap();

        // Second call with the network down returns the cached set, tagged
        let result = fetch_list(Some(&products), || async {
            Err::<Vec<Product>, _>("connection refused")
        })
        .await
        .unwrap();

        assert!(result.is_stale());
        assert_eq!(result.data.len(), 1);
        assert_eq!(result.data[0].id, "p1");
    }

    #[tokio::test]
    async fn test_fetch_list_errors_when_never_synced() {
        let (_dir, store) = open_store();
        let products = store.partition::<Product>().unwrap();

        let result = fetch_list(Some(&products), || async {
            Err::<Vec<Product>, _>("connection refused")
        })
        .await;

        assert_eq!(result.unwrap_err(), "connection refused");
    }

    #[tokio::test]
    async fn test_fetch_list_without_partition_passes_through() {
        let result = fetch_list::<Product, _, _, _>(None, || async {
            Ok::<_, &str>(vec![product("p1", "Aspirin", 10.0)])
        })
        .await
        .unwrap();
        assert!(!result.is_stale());

        let err = fetch_list::<Product, &str, _, _>(None, || async { Err("offline") }).await;
        assert_eq!(err.unwrap_err(), "offline");
    }

    #[tokio::test]
    async fn test_stale_response_does_not_resurrect_deletion() {
        let (_dir, store) = open_store();
        let products = store.partition::<Product>().unwrap();
        products.put(&product("p1", "Aspirin", 10.0)).unwrap();
        products.put(&product("p2", "Ibuprofen", 20.0)).unwrap();
        products.mark_refreshed().unwrap();

        // The fetch resolves after a local delete; its snapshot still
        // contains the deleted record.
        let snapshot = vec![product("p1", "Aspirin", 10.0), product("p2", "Ibuprofen", 20.0)];
        let during = products.clone();
        fetch_list(Some(&products), move || async move {
            during.delete("p1").unwrap();
            Ok::<_, &str>(snapshot)
        })
        .await
        .unwrap();

        assert!(products.get("p1").unwrap().is_none());
        assert!(products.get("p2").unwrap().is_some());
    }

    #[tokio::test]
    async fn test_fetch_related_merges_and_filters_fallback() {
        let (_dir, store) = open_store();
        let orders = store.partition::<Order>().unwrap();
        orders.put(&order("o1", "u1")).unwrap();
        orders.put(&order("o2", "u2")).unwrap();
        orders.mark_refreshed().unwrap();

        // Success path merges without touching other users' records
        fetch_related(
            Some(&orders),
            |o: &Order| o.user_id == "u1",
            || async { Ok::<_, &str>(vec![order("o3", "u1")]) },
        )
        .await
        .unwrap();
        assert_eq!(orders.get_all().unwrap().len(), 3);

        // Failure path serves only the matching subset
        let result = fetch_related(
            Some(&orders),
            |o: &Order| o.user_id == "u1",
            || async { Err::<Vec<Order>, _>("connection refused") },
        )
        .await
        .unwrap();
        assert!(result.is_stale());
        let mut ids: Vec<String> = result.data.into_iter().map(|o| o.id).collect();
        ids.sort();
        assert_eq!(ids, vec!["o1", "o3"]);
    }

    #[tokio::test]
    async fn test_fetch_one_falls_back_then_errors_on_miss() {
        let (_dir, store) = open_store();
        let products = store.partition::<Product>().unwrap();
        products.put(&product("p1", "Aspirin", 10.0)).unwrap();

        let result = fetch_one(Some(&products), "p1", || async {
            Err::<Product, _>("connection refused")
        })
        .await
        .unwrap();
        assert!(result.is_stale());
        assert_eq!(result.data.id, "p1");

        let err = fetch_one(Some(&products), "p9", || async {
            Err::<Product, _>("connection refused")
        })
        .await;
        assert_eq!(err.unwrap_err(), "connection refused");
    }

    #[tokio::test]
    async fn test_optimistic_transition_advances_on_success() {
        let mut sellers = vec![seller("s1", SellerStatus::Pending)];
        optimistic_transition(
            &mut sellers,
            "s1",
            SellerStatus::Approving,
            SellerStatus::Approved,
            || async { Ok::<_, &str>(()) },
        )
        .await
        .unwrap();
        assert_eq!(sellers[0].status, SellerStatus::Approved);
    }

    #[tokio::test]
    async fn test_optimistic_transition_rolls_back_on_failure() {
        let mut sellers = vec![seller("s1", SellerStatus::Pending)];
        let result = optimistic_transition(
            &mut sellers,
            "s1",
            SellerStatus::Approving,
            SellerStatus::Approved,
            || async { Err::<(), _>("server error") },
        )
        .await;

        assert!(result.is_err());
        // Back to the pre-action status, not the intermediate one
        assert_eq!(sellers[0].status, SellerStatus::Pending);
    }

    #[tokio::test]
    async fn test_optimistic_transition_runs_op_for_unknown_id() {
        let mut sellers = vec![seller("s1", SellerStatus::Pending)];
        let mut ran = false;
        optimistic_transition(
            &mut sellers,
            "s9",
            SellerStatus::Approving,
            SellerStatus::Approved,
            || {
                ran = true;
                async { Ok::<_, &str>(()) }
            },
        )
        .await
        .unwrap();
        assert!(ran);
        assert_eq!(sellers[0].status, SellerStatus::Pending);
    }
}
