//! Local Reconciliation Store
//!
//! Single in-memory source of truth for the UI. Two write paths lead into it:
//! user mutations (remote call first, local update on success) and realtime
//! change notifications (merged by [`Catalog::apply_change`]).
//!
//! State is published through `watch` channels so observers see every change.
//! No borrow of the state is held across a remote call.

mod catalog;
mod merge;
mod ordering;

use log::{debug, error};
use tokio::sync::watch;

use crate::domain::{
    CategoryId, CategoryPatch, NewCategory, NewSpot, SelectedPlace, SpotId, SpotPatch,
};
use crate::error::{DomainError, DomainResult};
use crate::realtime::ChangeNotification;
use crate::repository::{Backend, Repository};

pub use catalog::{Catalog, CategoryView, SpotView};
pub use ordering::swap_positions;
#[cfg(test)]
pub(crate) use catalog::fixtures;

pub struct SpotStore<B> {
    backend: B,
    state: watch::Sender<Catalog>,
    loading: watch::Sender<bool>,
}

impl<B: Backend> SpotStore<B> {
    pub fn new(backend: B) -> Self {
        let (state, _) = watch::channel(Catalog::new());
        let (loading, _) = watch::channel(false);
        Self {
            backend,
            state,
            loading,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    // ========================
    // Observation
    // ========================

    /// A copy of the current catalog
    pub fn snapshot(&self) -> Catalog {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Catalog> {
        self.state.subscribe()
    }

    pub fn subscribe_loading(&self) -> watch::Receiver<bool> {
        self.loading.subscribe()
    }

    pub fn is_loading(&self) -> bool {
        *self.loading.borrow()
    }

    pub fn total_spots(&self) -> usize {
        self.state.borrow().total_spots()
    }

    pub fn category(&self, id: CategoryId) -> Option<CategoryView> {
        self.state.borrow().category(id).cloned()
    }

    // ========================
    // Load / Clear
    // ========================

    /// Replaces local state with a full remote fetch. On failure local state is untouched.
    pub async fn load_categories(&self) -> DomainResult<()> {
        self.loading.send_replace(true);
        let result = self.fetch_catalog().await;
        self.loading.send_replace(false);

        match result {
            Ok(catalog) => {
                debug!(
                    "store: loaded {} categories, {} spots",
                    catalog.len(),
                    catalog.total_spots()
                );
                self.state.send_replace(catalog);
                Ok(())
            }
            Err(e) => {
                error!("Error loading categories: {e}");
                Err(e)
            }
        }
    }

    async fn fetch_catalog(&self) -> DomainResult<Catalog> {
        let categories = self.backend.categories().list().await?;
        let spots = self.backend.spots().list().await?;
        Ok(Catalog::from_rows(categories, spots))
    }

    /// Drops all local state (on sign-out)
    pub fn clear(&self) {
        self.state.send_if_modified(|catalog| {
            let had_rows = !catalog.is_empty();
            *catalog = Catalog::new();
            had_rows
        });
    }

    // ========================
    // Category Operations
    // ========================

    /// Creates a category at the end (display order = current count)
    pub async fn add_category(&self, name: &str) -> DomainResult<CategoryView> {
        let display_order = self.state.borrow().len() as i32;
        let row = self
            .backend
            .categories()
            .create(&NewCategory {
                name: name.to_string(),
                display_order,
            })
            .await?;

        let view = CategoryView::from(row);
        // The realtime echo may already have inserted it
        self.state
            .send_if_modified(|catalog| catalog.insert_category(view.clone()));
        Ok(view)
    }

    pub async fn remove_category(&self, id: CategoryId) -> DomainResult<()> {
        self.backend.categories().delete(id).await?;
        self.state
            .send_if_modified(|catalog| catalog.remove_category(id));
        Ok(())
    }

    /// Remote only: the local order changes when the realtime UPDATE arrives or on reload
    pub async fn update_category_order(&self, id: CategoryId, display_order: i32) -> DomainResult<()> {
        self.backend
            .categories()
            .update(id, &CategoryPatch::display_order(display_order))
            .await?;
        Ok(())
    }

    /// Exchanges the positions of two categories, renumbering the list when
    /// their orders are equal. Remote only, like `update_category_order`.
    pub async fn swap_categories(&self, a: CategoryId, b: CategoryId) -> DomainResult<()> {
        let siblings: Vec<(CategoryId, i32)> = self
            .state
            .borrow()
            .categories()
            .iter()
            .map(|c| (c.id, c.display_order))
            .collect();
        for (id, display_order) in swap_positions(&siblings, a, b) {
            self.update_category_order(id, display_order).await?;
        }
        Ok(())
    }

    /// Flips the expansion flag remotely, then locally. Returns the new value.
    pub async fn toggle_category_expanded(&self, id: CategoryId) -> DomainResult<bool> {
        let expanded = !self.require_category(id)?.expanded;
        self.backend
            .categories()
            .update(id, &CategoryPatch::expanded(expanded))
            .await?;
        self.state
            .send_if_modified(|catalog| catalog.set_expanded(id, expanded));
        Ok(expanded)
    }

    // ========================
    // Spot Operations
    // ========================

    /// Saves a place into a category, at the end of its list
    pub async fn add_spot(&self, category_id: CategoryId, place: &SelectedPlace) -> DomainResult<SpotView> {
        let display_order = self.require_category(category_id)?.spots.len() as i32;
        let draft = NewSpot {
            category_id,
            name: place.name.clone(),
            address: Some(place.address.clone()).filter(|a| !a.is_empty()),
            lat: place.lat,
            lng: place.lng,
            place_id: Some(place.place_id.clone()).filter(|p| !p.is_empty()),
            display_order,
        };
        let row = self.backend.spots().create(&draft).await?;

        let view = SpotView::from(row);
        self.state
            .send_if_modified(|catalog| catalog.insert_spot(view.clone()));
        Ok(view)
    }

    /// Deletes remotely, then from `category_id`'s list; a spot missing locally is fine
    pub async fn remove_spot(&self, category_id: CategoryId, spot_id: SpotId) -> DomainResult<()> {
        self.backend.spots().delete(spot_id).await?;
        self.state
            .send_if_modified(|catalog| catalog.remove_spot_from(category_id, spot_id));
        Ok(())
    }

    pub async fn rename_spot(&self, spot_id: SpotId, name: &str) -> DomainResult<()> {
        self.backend
            .spots()
            .update(spot_id, &SpotPatch::name(name))
            .await?;
        self.state
            .send_if_modified(|catalog| catalog.rename_spot(spot_id, name));
        Ok(())
    }

    /// Remote only, like [`update_category_order`](Self::update_category_order)
    pub async fn update_spot_order(&self, spot_id: SpotId, display_order: i32) -> DomainResult<()> {
        self.backend
            .spots()
            .update(spot_id, &SpotPatch::display_order(display_order))
            .await?;
        Ok(())
    }

    /// Exchanges the positions of two spots of `category_id`, renumbering its
    /// list when their orders are equal
    pub async fn swap_spots(&self, category_id: CategoryId, a: SpotId, b: SpotId) -> DomainResult<()> {
        let siblings: Vec<(SpotId, i32)> = self
            .require_category(category_id)?
            .spots
            .iter()
            .map(|s| (s.id, s.display_order))
            .collect();
        for (id, display_order) in swap_positions(&siblings, a, b) {
            self.update_spot_order(id, display_order).await?;
        }
        Ok(())
    }

    /// Remote only; the realtime UPDATE moves the spot locally
    pub async fn move_spot(&self, spot_id: SpotId, category_id: CategoryId) -> DomainResult<()> {
        self.backend
            .spots()
            .update(spot_id, &SpotPatch::category(category_id))
            .await?;
        Ok(())
    }

    // ========================
    // Realtime Ingestion
    // ========================

    /// Merges a remote change notification. Returns whether local state changed.
    pub fn apply_change(&self, change: &ChangeNotification) -> DomainResult<bool> {
        let mut result = Ok(false);
        self.state.send_if_modified(|catalog| {
            result = catalog.apply_change(change);
            matches!(result, Ok(true))
        });
        result
    }

    fn require_category(&self, id: CategoryId) -> DomainResult<CategoryView> {
        self.category(id)
            .ok_or_else(|| DomainError::NotFound(format!("category {id}")))
    }
}
