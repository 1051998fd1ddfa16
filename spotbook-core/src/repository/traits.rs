//! Repository Layer - Core Traits
//!
//! Defines the abstract interfaces for data access.
//! Implementations talk to the hosted REST API or keep rows in memory.

use async_trait::async_trait;

use crate::domain::{Category, Entity, Spot};
use crate::error::DomainResult;

/// Row-level CRUD against one backend table
///
/// Futures are not `Send`: the client runs on a single event loop.
#[async_trait(?Send)]
pub trait Repository<T: Entity> {
    /// List all rows visible to the current user, ascending by display order
    async fn list(&self) -> DomainResult<Vec<T>>;

    /// Insert a row owned by the current user and return it
    async fn create(&self, draft: &T::Draft) -> DomainResult<T>;

    /// Apply a partial update and return the updated row
    async fn update(&self, id: T::Id, patch: &T::Patch) -> DomainResult<T>;

    /// Delete by ID; deleting a missing row is not an error
    async fn delete(&self, id: T::Id) -> DomainResult<()>;
}

/// The two tables the client works with
pub trait Backend {
    type Categories: Repository<Category>;
    type Spots: Repository<Spot>;

    fn categories(&self) -> &Self::Categories;
    fn spots(&self) -> &Self::Spots;
}
