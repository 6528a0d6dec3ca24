//! In-memory stand-ins for the hosting service, record store, relation service
//! and an unreachable counter cache.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use imgvault_core::models::{AssetRecord, AuthorizationGrant, HostedAsset, SignedUpload};
use imgvault_db::{AssetStore, StoreError, StoreResult};
use imgvault_hosting::{HostingError, HostingResult, HostingService};
use imgvault_infra::{
    CacheError, CacheResult, CounterCache, RelationError, RelationResult, RelationService,
};

/// Ordered record of collaborator calls, shared by every fake.
#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.0.lock().unwrap().clear();
    }
}

fn unavailable() -> StoreError {
    StoreError::Database(sqlx::Error::PoolTimedOut)
}

pub struct FakeHosting {
    log: CallLog,
    issued: AtomicUsize,
    assets: Mutex<BTreeMap<String, HostedAsset>>,
    fail_issue: AtomicBool,
    fail_delete: AtomicBool,
    failing_fetches: Mutex<HashSet<String>>,
    issue_delay: Mutex<Option<Duration>>,
}

impl FakeHosting {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            issued: AtomicUsize::new(0),
            assets: Mutex::new(BTreeMap::new()),
            fail_issue: AtomicBool::new(false),
            fail_delete: AtomicBool::new(false),
            failing_fetches: Mutex::new(HashSet::new()),
            issue_delay: Mutex::new(None),
        }
    }

    /// Number of upload URLs handed out so far.
    pub fn issued(&self) -> usize {
        self.issued.load(Ordering::SeqCst)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.assets.lock().unwrap().contains_key(id)
    }

    pub fn fail_issue(&self, fail: bool) {
        self.fail_issue.store(fail, Ordering::SeqCst);
    }

    pub fn fail_delete(&self, fail: bool) {
        self.fail_delete.store(fail, Ordering::SeqCst);
    }

    pub fn fail_fetch(&self, id: &str) {
        self.failing_fetches.lock().unwrap().insert(id.to_string());
    }

    pub fn delay_issue(&self, delay: Duration) {
        *self.issue_delay.lock().unwrap() = Some(delay);
    }
}

#[async_trait]
impl HostingService for FakeHosting {
    async fn issue_upload_url(
        &self,
        metadata: &BTreeMap<String, String>,
    ) -> HostingResult<SignedUpload> {
        let delay = *self.issue_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_issue.load(Ordering::SeqCst) {
            return Err(HostingError::Api {
                status: 503,
                message: "direct upload unavailable".to_string(),
            });
        }

        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        let id = format!("img-{}", n);
        let uploaded: DateTime<Utc> = Utc::now() - chrono::Duration::minutes(10);
        self.assets.lock().unwrap().insert(
            id.clone(),
            HostedAsset {
                id: id.clone(),
                filename: format!("{}.jpg", id),
                uploaded,
                meta: metadata.clone(),
                variants: vec![
                    format!("https://imagedelivery.net/acct-hash/{}/public", id),
                    format!("https://imagedelivery.net/acct-hash/{}/thumbnail", id),
                ],
            },
        );

        Ok(SignedUpload {
            upload_url: format!("https://upload.imagedelivery.net/acct-hash/{}", id),
            image_id: id,
        })
    }

    async fn fetch_asset(&self, id: &str) -> HostingResult<HostedAsset> {
        if self.failing_fetches.lock().unwrap().contains(id) {
            return Err(HostingError::Api {
                status: 500,
                message: format!("lookup of {} failed", id),
            });
        }
        self.assets
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| HostingError::NotFound(id.to_string()))
    }

    async fn delete_asset(&self, id: &str) -> HostingResult<()> {
        self.log.push(format!("hosting.delete:{}", id));
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(HostingError::Api {
                status: 503,
                message: "delete unavailable".to_string(),
            });
        }
        self.assets.lock().unwrap().remove(id);
        Ok(())
    }
}

pub struct FakeAssetStore {
    log: CallLog,
    records: Mutex<BTreeMap<String, AssetRecord>>,
    fail_insert: AtomicBool,
    fail_delete: AtomicBool,
    failing_increments: Mutex<HashSet<String>>,
}

impl FakeAssetStore {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            records: Mutex::new(BTreeMap::new()),
            fail_insert: AtomicBool::new(false),
            fail_delete: AtomicBool::new(false),
            failing_increments: Mutex::new(HashSet::new()),
        }
    }

    pub fn get(&self, external_id: &str) -> Option<AssetRecord> {
        self.records.lock().unwrap().get(external_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn put(&self, record: AssetRecord) {
        self.records
            .lock()
            .unwrap()
            .insert(record.external_id.clone(), record);
    }

    pub fn fail_insert(&self, fail: bool) {
        self.fail_insert.store(fail, Ordering::SeqCst);
    }

    pub fn fail_delete(&self, fail: bool) {
        self.fail_delete.store(fail, Ordering::SeqCst);
    }

    /// Make count merges for `external_id` fail until [`allow_increment`](Self::allow_increment).
    pub fn fail_increment(&self, external_id: &str) {
        self.failing_increments
            .lock()
            .unwrap()
            .insert(external_id.to_string());
    }

    pub fn allow_increment(&self, external_id: &str) {
        self.failing_increments.lock().unwrap().remove(external_id);
    }
}

#[async_trait]
impl AssetStore for FakeAssetStore {
    async fn insert_many(&self, records: &[AssetRecord]) -> StoreResult<()> {
        self.log.push(format!("store.insert:{}", records.len()));
        if self.fail_insert.load(Ordering::SeqCst) {
            return Err(unavailable());
        }

        // All or nothing, like the transactional insert.
        let mut stored = self.records.lock().unwrap();
        let mut seen = HashSet::new();
        for record in records {
            if stored.contains_key(&record.external_id) || !seen.insert(&record.external_id) {
                return Err(StoreError::Duplicate(record.external_id.clone()));
            }
        }
        for record in records {
            stored.insert(record.external_id.clone(), record.clone());
        }
        Ok(())
    }

    async fn find_by_external_id(&self, external_id: &str) -> StoreResult<Option<AssetRecord>> {
        Ok(self.get(external_id))
    }

    async fn delete_by_external_ids(&self, external_ids: &[String]) -> StoreResult<u64> {
        for id in external_ids {
            self.log.push(format!("store.delete:{}", id));
        }
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        let mut stored = self.records.lock().unwrap();
        Ok(external_ids
            .iter()
            .filter(|id| stored.remove(id.as_str()).is_some())
            .count() as u64)
    }

    async fn increment_count(&self, external_id: &str, delta: i64) -> StoreResult<bool> {
        if self.failing_increments.lock().unwrap().contains(external_id) {
            return Err(unavailable());
        }
        match self.records.lock().unwrap().get_mut(external_id) {
            Some(record) => {
                record.count += delta;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list_pending_owner(
        &self,
        uploaded_before: DateTime<Utc>,
        limit: i64,
    ) -> StoreResult<Vec<AssetRecord>> {
        let mut pending: Vec<AssetRecord> = self
            .records
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.pending_owner.is_some() && r.uploaded_at < uploaded_before)
            .cloned()
            .collect();
        pending.sort_by_key(|r| r.uploaded_at);
        pending.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(pending)
    }

    async fn clear_pending_owner(&self, external_ids: &[String]) -> StoreResult<u64> {
        let mut stored = self.records.lock().unwrap();
        let mut cleared = 0;
        for id in external_ids {
            if let Some(record) = stored.get_mut(id) {
                if record.pending_owner.take().is_some() {
                    cleared += 1;
                }
            }
        }
        Ok(cleared)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Tuple {
    pub namespace: String,
    pub object: String,
    pub relation: String,
    pub subject: String,
}

pub struct FakeRelations {
    log: CallLog,
    tuples: Mutex<BTreeSet<Tuple>>,
    fail_add: AtomicBool,
    fail_delete: AtomicBool,
}

impl FakeRelations {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            tuples: Mutex::new(BTreeSet::new()),
            fail_add: AtomicBool::new(false),
            fail_delete: AtomicBool::new(false),
        }
    }

    pub fn is_owner(&self, object: &str, subject: &str) -> bool {
        self.tuples.lock().unwrap().iter().any(|t| {
            t.object == object && t.relation == "owner" && t.subject == subject
        })
    }

    pub fn len(&self) -> usize {
        self.tuples.lock().unwrap().len()
    }

    pub fn fail_add(&self, fail: bool) {
        self.fail_add.store(fail, Ordering::SeqCst);
    }

    pub fn fail_delete(&self, fail: bool) {
        self.fail_delete.store(fail, Ordering::SeqCst);
    }

    fn failure() -> RelationError {
        RelationError::Api {
            status: 503,
            message: "relation service unavailable".to_string(),
        }
    }
}

#[async_trait]
impl RelationService for FakeRelations {
    async fn add_grant(&self, grant: &AuthorizationGrant) -> RelationResult<()> {
        if self.fail_add.load(Ordering::SeqCst) {
            return Err(Self::failure());
        }
        self.tuples.lock().unwrap().insert(Tuple {
            namespace: grant.namespace.clone(),
            object: grant.object_id.clone(),
            relation: grant.role.as_str().to_string(),
            subject: grant.subject_id.clone(),
        });
        Ok(())
    }

    async fn delete_object(&self, namespace: &str, object_id: &str) -> RelationResult<()> {
        self.log.push(format!("relation.delete:{}", object_id));
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(Self::failure());
        }
        self.tuples
            .lock()
            .unwrap()
            .retain(|t| !(t.namespace == namespace && t.object == object_id));
        Ok(())
    }

    async fn check(
        &self,
        namespace: &str,
        object_id: &str,
        relation: &str,
        subject_id: &str,
    ) -> RelationResult<bool> {
        Ok(self.tuples.lock().unwrap().iter().any(|t| {
            t.namespace == namespace
                && t.object == object_id
                && t.relation == relation
                && t.subject == subject_id
        }))
    }
}

/// Counter cache whose every call fails.
pub struct UnreachableCounters;

impl UnreachableCounters {
    fn failure(id: &str) -> CacheError {
        CacheError::InvalidValue {
            key: id.to_string(),
            reason: "counter store unreachable".to_string(),
        }
    }
}

#[async_trait]
impl CounterCache for UnreachableCounters {
    async fn incr_by(&self, id: &str, _delta: i64) -> CacheResult<i64> {
        Err(Self::failure(id))
    }

    async fn scan_ids(&self) -> CacheResult<Vec<String>> {
        Err(Self::failure("*"))
    }

    async fn take(&self, id: &str) -> CacheResult<i64> {
        Err(Self::failure(id))
    }
}
