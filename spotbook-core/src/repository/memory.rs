//! In-Memory Repository
//!
//! Keeps rows in process and echoes every write as a change notification,
//! the way the hosted backend's change feed does. Used by tests and offline
//! demos.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use log::debug;
use serde_json::json;
use tokio::sync::{broadcast, Mutex};
use uuid::Uuid;

use crate::domain::{Category, Entity, Spot, UserId};
use crate::error::{DomainError, DomainResult};
use crate::realtime::{ChangeKind, ChangeNotification};
use super::traits::{Backend, Repository};

const CHANGE_BUFFER: usize = 256;

/// State shared by the repositories of one backend
struct Shared {
    user: Option<UserId>,
    offline: AtomicBool,
    changes: broadcast::Sender<ChangeNotification>,
}

impl Shared {
    fn check_online(&self) -> DomainResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(DomainError::remote(503, "backend unavailable"));
        }
        Ok(())
    }

    fn publish(&self, notification: ChangeNotification) {
        // No subscribers is fine
        let _ = self.changes.send(notification);
    }
}

pub struct MemoryRepository<T> {
    rows: Arc<Mutex<Vec<T>>>,
    shared: Arc<Shared>,
}

impl<T: Entity> MemoryRepository<T> {
    fn with_shared(shared: Arc<Shared>) -> Self {
        Self {
            rows: Arc::new(Mutex::new(Vec::new())),
            shared,
        }
    }

    /// Inserts a row as-is, without publishing a change
    pub async fn seed(&self, row: T) {
        self.rows.lock().await.push(row);
    }

    pub async fn rows(&self) -> Vec<T> {
        self.rows.lock().await.clone()
    }
}

#[async_trait(?Send)]
impl<T: Entity> Repository<T> for MemoryRepository<T> {
    async fn list(&self) -> DomainResult<Vec<T>> {
        self.shared.check_online()?;
        let mut rows = self.rows.lock().await.clone();
        rows.sort_by_key(|row| row.display_order());
        Ok(rows)
    }

    async fn create(&self, draft: &T::Draft) -> DomainResult<T> {
        self.shared.check_online()?;
        let user = self.shared.user.ok_or(DomainError::Unauthenticated)?;
        let row = T::from_draft(T::Id::from(Uuid::new_v4()), user, draft, Utc::now());
        debug!("memory: insert into {} {}", T::TABLE, row.id());
        self.rows.lock().await.push(row.clone());
        self.shared.publish(ChangeNotification {
            table: T::TABLE,
            kind: ChangeKind::Insert,
            new: Some(serde_json::to_value(&row)?),
            old: None,
        });
        Ok(row)
    }

    async fn update(&self, id: T::Id, patch: &T::Patch) -> DomainResult<T> {
        self.shared.check_online()?;
        let row = {
            let mut rows = self.rows.lock().await;
            let row = rows
                .iter_mut()
                .find(|row| row.id() == id)
                .ok_or_else(|| DomainError::remote(406, format!("{} {id} not found", T::TABLE)))?;
            row.apply_patch(patch, Utc::now());
            row.clone()
        };
        self.shared.publish(ChangeNotification {
            table: T::TABLE,
            kind: ChangeKind::Update,
            new: Some(serde_json::to_value(&row)?),
            old: Some(json!({ "id": id })),
        });
        Ok(row)
    }

    async fn delete(&self, id: T::Id) -> DomainResult<()> {
        self.shared.check_online()?;
        let removed = {
            let mut rows = self.rows.lock().await;
            let before = rows.len();
            rows.retain(|row| row.id() != id);
            rows.len() != before
        };
        if removed {
            self.shared.publish(ChangeNotification {
                table: T::TABLE,
                kind: ChangeKind::Delete,
                new: None,
                old: Some(json!({ "id": id })),
            });
        }
        Ok(())
    }
}

/// Both tables in memory, sharing one change feed
pub struct MemoryBackend {
    categories: MemoryRepository<Category>,
    spots: MemoryRepository<Spot>,
    shared: Arc<Shared>,
}

impl MemoryBackend {
    /// A backend whose writes are owned by `user`; `None` makes creates fail as unauthenticated
    pub fn new(user: Option<UserId>) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_BUFFER);
        let shared = Arc::new(Shared {
            user,
            offline: AtomicBool::new(false),
            changes,
        });
        Self {
            categories: MemoryRepository::with_shared(shared.clone()),
            spots: MemoryRepository::with_shared(shared.clone()),
            shared,
        }
    }

    pub fn signed_in(user: UserId) -> Self {
        Self::new(Some(user))
    }

    /// While offline every call fails with a 503 remote error
    pub fn set_offline(&self, offline: bool) {
        self.shared.offline.store(offline, Ordering::SeqCst);
    }

    /// Change notifications for every successful write
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeNotification> {
        self.shared.changes.subscribe()
    }
}

impl Backend for MemoryBackend {
    type Categories = MemoryRepository<Category>;
    type Spots = MemoryRepository<Spot>;

    fn categories(&self) -> &Self::Categories {
        &self.categories
    }

    fn spots(&self) -> &Self::Spots {
        &self.spots
    }
}
