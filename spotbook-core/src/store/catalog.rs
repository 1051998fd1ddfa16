//! Catalog
//!
//! The local, ordered view of categories and their spots, plus the
//! primitive mutations the store and the realtime merge are built from.
//! Siblings are kept sorted ascending by display order; the sort is stable,
//! so ties keep arrival order.

use serde::{Deserialize, Serialize};

use crate::domain::{Category, CategoryId, Spot, SpotId};

/// A spot as the UI renders it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpotView {
    pub id: SpotId,
    pub category_id: CategoryId,
    pub name: String,
    /// Empty when the backend has no address
    pub address: String,
    pub lat: f64,
    pub lng: f64,
    /// Empty when the spot is not linked to a place
    pub place_id: String,
    pub display_order: i32,
}

impl From<Spot> for SpotView {
    fn from(spot: Spot) -> Self {
        Self {
            id: spot.id,
            category_id: spot.category_id,
            name: spot.name,
            address: spot.address.unwrap_or_default(),
            lat: spot.lat,
            lng: spot.lng,
            place_id: spot.place_id.unwrap_or_default(),
            display_order: spot.display_order,
        }
    }
}

/// A category with its spots, as the UI renders it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryView {
    pub id: CategoryId,
    pub name: String,
    pub expanded: bool,
    pub display_order: i32,
    pub spots: Vec<SpotView>,
}

impl CategoryView {
    pub fn with_spots(category: Category, spots: Vec<SpotView>) -> Self {
        let mut view = Self {
            id: category.id,
            name: category.name,
            expanded: category.expanded,
            display_order: category.display_order,
            spots,
        };
        view.sort_spots();
        view
    }

    pub fn spot(&self, id: SpotId) -> Option<&SpotView> {
        self.spots.iter().find(|s| s.id == id)
    }

    pub(crate) fn sort_spots(&mut self) {
        self.spots.sort_by_key(|s| s.display_order);
    }
}

impl From<Category> for CategoryView {
    fn from(category: Category) -> Self {
        Self::with_spots(category, Vec::new())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    categories: Vec<CategoryView>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the catalog from a full remote fetch: each category gets the
    /// spots whose `category_id` matches it. Spots of unknown categories are dropped.
    pub fn from_rows(categories: Vec<Category>, spots: Vec<Spot>) -> Self {
        let spots: Vec<SpotView> = spots.into_iter().map(SpotView::from).collect();
        let mut categories: Vec<CategoryView> = categories
            .into_iter()
            .map(|category| {
                let own = spots
                    .iter()
                    .filter(|s| s.category_id == category.id)
                    .cloned()
                    .collect();
                CategoryView::with_spots(category, own)
            })
            .collect();
        categories.sort_by_key(|c| c.display_order);
        Self { categories }
    }

    pub fn categories(&self) -> &[CategoryView] {
        &self.categories
    }

    pub fn category(&self, id: CategoryId) -> Option<&CategoryView> {
        self.categories.iter().find(|c| c.id == id)
    }

    /// Finds a spot in any category
    pub fn spot(&self, id: SpotId) -> Option<&SpotView> {
        self.categories.iter().find_map(|c| c.spot(id))
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    pub fn total_spots(&self) -> usize {
        self.categories.iter().map(|c| c.spots.len()).sum()
    }

    // ========================
    // Category Mutations
    // ========================

    /// Appends a category unless one with the same id exists. Returns whether it was added.
    pub(crate) fn insert_category(&mut self, category: CategoryView) -> bool {
        if self.category(category.id).is_some() {
            return false;
        }
        self.categories.push(category);
        self.sort_categories();
        true
    }

    pub(crate) fn remove_category(&mut self, id: CategoryId) -> bool {
        let before = self.categories.len();
        self.categories.retain(|c| c.id != id);
        self.categories.len() != before
    }

    pub(crate) fn category_mut(&mut self, id: CategoryId) -> Option<&mut CategoryView> {
        self.categories.iter_mut().find(|c| c.id == id)
    }

    pub(crate) fn set_expanded(&mut self, id: CategoryId, expanded: bool) -> bool {
        match self.category_mut(id) {
            Some(c) if c.expanded != expanded => {
                c.expanded = expanded;
                true
            }
            _ => false,
        }
    }

    pub(crate) fn sort_categories(&mut self) {
        self.categories.sort_by_key(|c| c.display_order);
    }

    // ========================
    // Spot Mutations
    // ========================

    /// Appends a spot to its category unless the id is already present anywhere,
    /// or the category is unknown. Returns whether it was added.
    pub(crate) fn insert_spot(&mut self, spot: SpotView) -> bool {
        if self.spot(spot.id).is_some() {
            return false;
        }
        match self.category_mut(spot.category_id) {
            Some(category) => {
                category.spots.push(spot);
                category.sort_spots();
                true
            }
            None => false,
        }
    }

    /// Removes a spot from one category only
    pub(crate) fn remove_spot_from(&mut self, category_id: CategoryId, spot_id: SpotId) -> bool {
        match self.category_mut(category_id) {
            Some(category) => {
                let before = category.spots.len();
                category.spots.retain(|s| s.id != spot_id);
                category.spots.len() != before
            }
            None => false,
        }
    }

    /// Removes a spot from every category
    pub(crate) fn remove_spot(&mut self, spot_id: SpotId) -> bool {
        let mut removed = false;
        for category in &mut self.categories {
            let before = category.spots.len();
            category.spots.retain(|s| s.id != spot_id);
            removed |= category.spots.len() != before;
        }
        removed
    }

    /// Renames a spot wherever it appears
    pub(crate) fn rename_spot(&mut self, spot_id: SpotId, name: &str) -> bool {
        let mut changed = false;
        for spot in self.spots_mut().filter(|s| s.id == spot_id) {
            if spot.name != name {
                spot.name = name.to_string();
                changed = true;
            }
        }
        changed
    }

    pub(crate) fn spots_mut(&mut self) -> impl Iterator<Item = &mut SpotView> {
        self.categories.iter_mut().flat_map(|c| c.spots.iter_mut())
    }

    pub(crate) fn categories_mut(&mut self) -> impl Iterator<Item = &mut CategoryView> {
        self.categories.iter_mut()
    }
}
