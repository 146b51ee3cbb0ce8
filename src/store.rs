// =============================================
// Record store: DynamoDB + local fallback cache
// =============================================
// DynamoDB table (TABLE_NAME):
//   PK: id (S)
//   Attributes: title (S), slug (S), target_url (S), created_at (S, RFC 3339)
//
// `CachedStore` keeps the last good view of the table in memory. Reads fall back to
// it when the remote call fails, and a failed remote insert is kept there so the
// operator's link still resolves from this instance. The table stays authoritative:
// a record the remote no longer has is dropped unless it was only ever written here.

use async_trait::async_trait;
use aws_sdk_dynamodb as ddb;
use aws_sdk_dynamodb::error::ProvideErrorMetadata; // for .code()
use ddb::types::AttributeValue as Av;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::model::{LinkRecord, Persisted};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("record store unavailable: {0}")]
    Unavailable(String),
    #[error("malformed record {0}")]
    Malformed(String),
}

#[async_trait]
pub trait RecordStore: Send + Sync + 'static {
    /// Newest first.
    async fn get_all(&self) -> Result<Vec<LinkRecord>, StoreError>;
    async fn get_by_id(&self, id: &str) -> Result<Option<LinkRecord>, StoreError>;
    /// `Ok(false)` when a record with the same id already exists.
    async fn insert(&self, record: &LinkRecord) -> Result<bool, StoreError>;
    async fn delete(&self, id: &str) -> Result<bool, StoreError>;
    async fn test_connection(&self) -> bool;
}

#[async_trait]
impl<T: RecordStore + ?Sized> RecordStore for Arc<T> {
    async fn get_all(&self) -> Result<Vec<LinkRecord>, StoreError> {
        (**self).get_all().await
    }
    async fn get_by_id(&self, id: &str) -> Result<Option<LinkRecord>, StoreError> {
        (**self).get_by_id(id).await
    }
    async fn insert(&self, record: &LinkRecord) -> Result<bool, StoreError> {
        (**self).insert(record).await
    }
    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        (**self).delete(id).await
    }
    async fn test_connection(&self) -> bool {
        (**self).test_connection().await
    }
}

// ----------------- DynamoDB -----------------

#[derive(Clone)]
pub struct DynamoStore {
    pub ddb: ddb::Client,
    pub table: String,
}

impl DynamoStore {
    pub fn new(ddb: ddb::Client, table: impl Into<String>) -> Self {
        Self {
            ddb,
            table: table.into(),
        }
    }
}

fn unavailable<E: std::fmt::Debug>(op: &str, e: E) -> StoreError {
    StoreError::Unavailable(format!("ddb {op}: {e:?}"))
}

fn item_to_record(item: &HashMap<String, Av>) -> Result<LinkRecord, StoreError> {
    let s = |k: &str| item.get(k).and_then(|v| v.as_s().ok()).cloned();
    let id = s("id").ok_or_else(|| StoreError::Malformed("missing id".into()))?;
    Ok(LinkRecord {
        title: s("title").unwrap_or_default(),
        slug: s("slug").unwrap_or_default(),
        // an empty target is tolerated here; the gate just never navigates
        target_url: s("target_url").unwrap_or_default(),
        created_at: s("created_at").unwrap_or_default(),
        id,
    })
}

fn record_to_item(r: &LinkRecord) -> HashMap<String, Av> {
    HashMap::from([
        ("id".to_string(), Av::S(r.id.clone())),
        ("title".to_string(), Av::S(r.title.clone())),
        ("slug".to_string(), Av::S(r.slug.clone())),
        ("target_url".to_string(), Av::S(r.target_url.clone())),
        ("created_at".to_string(), Av::S(r.created_at.clone())),
    ])
}

#[async_trait]
impl RecordStore for DynamoStore {
    async fn get_all(&self) -> Result<Vec<LinkRecord>, StoreError> {
        let mut out = Vec::new();
        let mut start_key: Option<HashMap<String, Av>> = None;
        loop {
            let resp = self
                .ddb
                .scan()
                .table_name(&self.table)
                .set_exclusive_start_key(start_key.take())
                .send()
                .await
                .map_err(|e| unavailable("scan", e))?;
            for item in resp.items() {
                match item_to_record(item) {
                    Ok(r) => out.push(r),
                    Err(e) => tracing::warn!(error = %e, "skipping malformed item"),
                }
            }
            match resp.last_evaluated_key() {
                Some(k) if !k.is_empty() => start_key = Some(k.clone()),
                _ => break,
            }
        }
        // RFC 3339 in UTC sorts lexically
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(out)
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<LinkRecord>, StoreError> {
        let r = self
            .ddb
            .get_item()
            .table_name(&self.table)
            .key("id", Av::S(id.to_string()))
            .send()
            .await
            .map_err(|e| unavailable("get", e))?;
        r.item.as_ref().map(item_to_record).transpose()
    }

    async fn insert(&self, record: &LinkRecord) -> Result<bool, StoreError> {
        let r = self
            .ddb
            .put_item()
            .table_name(&self.table)
            .set_item(Some(record_to_item(record)))
            .condition_expression("attribute_not_exists(#i)")
            .expression_attribute_names("#i", "id")
            .send()
            .await;

        match r {
            Ok(_) => Ok(true),
            Err(e) => {
                if e.code() == Some("ConditionalCheckFailedException") {
                    return Ok(false);
                }
                Err(unavailable("put", e))
            }
        }
    }

    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let r = self
            .ddb
            .delete_item()
            .table_name(&self.table)
            .key("id", Av::S(id.to_string()))
            .condition_expression("attribute_exists(#i)")
            .expression_attribute_names("#i", "id")
            .send()
            .await;

        match r {
            Ok(_) => Ok(true),
            Err(e) => {
                if e.code() == Some("ConditionalCheckFailedException") {
                    return Ok(false);
                }
                Err(unavailable("delete", e))
            }
        }
    }

    async fn test_connection(&self) -> bool {
        match self
            .ddb
            .describe_table()
            .table_name(&self.table)
            .send()
            .await
        {
            Ok(_) => true,
            Err(e) => {
                tracing::error!(
                    "ddb describe table err: code={:?} msg={:?}",
                    e.code(),
                    e.message()
                );
                false
            }
        }
    }
}

// ----------------- In-memory -----------------

/// Local record cache. Also serves as the store in tests and local runs.
#[derive(Default, Clone)]
pub struct MemoryStore {
    records: Arc<RwLock<Vec<LinkRecord>>>,
}

impl MemoryStore {
    pub fn with_records(records: Vec<LinkRecord>) -> Self {
        Self {
            records: Arc::new(RwLock::new(records)),
        }
    }

    /// Replace the cached view with a fresh remote listing. Of the records the
    /// remote lacks, only ids in `pending` survive.
    pub async fn refresh(&self, remote: &[LinkRecord], pending: &HashSet<String>) {
        let mut guard = self.records.write().await;
        let local_only: Vec<LinkRecord> = guard
            .iter()
            .filter(|r| pending.contains(&r.id))
            .filter(|r| !remote.iter().any(|x| x.id == r.id))
            .cloned()
            .collect();
        *guard = remote.to_vec();
        guard.extend(local_only);
    }

    pub async fn upsert(&self, record: &LinkRecord) {
        let mut guard = self.records.write().await;
        match guard.iter_mut().find(|r| r.id == record.id) {
            Some(slot) => *slot = record.clone(),
            None => guard.push(record.clone()),
        }
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn get_all(&self) -> Result<Vec<LinkRecord>, StoreError> {
        let mut out = self.records.read().await.clone();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(out)
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<LinkRecord>, StoreError> {
        Ok(self.records.read().await.iter().find(|r| r.id == id).cloned())
    }

    async fn insert(&self, record: &LinkRecord) -> Result<bool, StoreError> {
        let mut guard = self.records.write().await;
        if guard.iter().any(|r| r.id == record.id) {
            return Ok(false);
        }
        guard.push(record.clone());
        Ok(true)
    }

    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let mut guard = self.records.write().await;
        let before = guard.len();
        guard.retain(|r| r.id != id);
        Ok(guard.len() != before)
    }

    async fn test_connection(&self) -> bool {
        true
    }
}

// ----------------- Remote + cache -----------------

pub struct CachedStore<R: RecordStore> {
    remote: R,
    cache: MemoryStore,
    // ids whose remote insert failed; the only records allowed to outlive a remote miss
    local_only: RwLock<HashSet<String>>,
}

impl<R: RecordStore> CachedStore<R> {
    pub fn new(remote: R) -> Self {
        Self {
            remote,
            cache: MemoryStore::default(),
            local_only: RwLock::new(HashSet::new()),
        }
    }

    pub fn cache(&self) -> &MemoryStore {
        &self.cache
    }

    pub async fn list(&self) -> Vec<LinkRecord> {
        match self.remote.get_all().await {
            Ok(all) => {
                let mut pending = self.local_only.write().await;
                pending.retain(|id| !all.iter().any(|r| &r.id == id));
                self.cache.refresh(&all, &pending).await;
                drop(pending);
                // cache may hold local-only records on top of the remote view
                self.cache.get_all().await.unwrap_or(all)
            }
            Err(e) => {
                tracing::warn!(error = %e, "listing from local cache");
                self.cache.get_all().await.unwrap_or_default()
            }
        }
    }

    pub async fn find(&self, id: &str) -> Option<LinkRecord> {
        match self.remote.get_by_id(id).await {
            Ok(Some(r)) => {
                self.local_only.write().await.remove(id);
                self.cache.upsert(&r).await;
                Some(r)
            }
            Ok(None) => {
                if self.local_only.read().await.contains(id) {
                    return self.cache.get_by_id(id).await.ok().flatten();
                }
                // gone remotely; stop serving the stale copy
                if let Ok(true) = self.cache.delete(id).await {
                    tracing::info!(id, "evicted record deleted remotely");
                }
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, id, "lookup falling back to local cache");
                self.cache.get_by_id(id).await.ok().flatten()
            }
        }
    }

    /// `Ok(None)` when the id is taken remotely; the caller re-rolls the id.
    pub async fn persist(&self, record: &LinkRecord) -> Result<Option<Persisted>, StoreError> {
        match self.remote.insert(record).await {
            Ok(true) => {
                self.cache.upsert(record).await;
                Ok(Some(Persisted::Remote))
            }
            Ok(false) => Ok(None),
            Err(e) => {
                tracing::warn!(error = %e, id = %record.id, "remote insert failed; kept locally");
                if self.cache.insert(record).await? {
                    self.local_only.write().await.insert(record.id.clone());
                    Ok(Some(Persisted::LocalOnly))
                } else {
                    Ok(None)
                }
            }
        }
    }

    pub async fn remove(&self, id: &str) -> Result<bool, StoreError> {
        let local = self.cache.delete(id).await?;
        self.local_only.write().await.remove(id);
        match self.remote.delete(id).await {
            Ok(remote) => Ok(remote || local),
            Err(e) if local => {
                tracing::warn!(error = %e, id, "remote delete failed; removed locally");
                Ok(true)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn healthy(&self) -> bool {
        self.remote.test_connection().await
    }
}
