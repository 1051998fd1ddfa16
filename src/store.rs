//! Global Application State Store
//!
//! Uses Leptos reactive_stores for fine-grained reactivity. The catalog here is
//! a mirror of the client library's store, refreshed whenever that one changes.

use leptos::prelude::*;
use reactive_stores::Store;
use spotbook_core::{Catalog, User};

use crate::models::CategoryView;

/// Global application state with field-level reactivity
#[derive(Clone, Debug, Default, Store)]
pub struct AppState {
    /// Categories in display order, each with its spots
    pub categories: Vec<CategoryView>,
    pub total_spots: usize,
    /// A full catalog load is in flight
    pub loading: bool,
    /// Email of the signed-in user (None = signed out)
    pub user_email: Option<String>,
    pub signed_in: bool,
    /// Last failure worth showing to the user
    pub error: Option<String>,
}

/// Type alias for the store
pub type AppStore = Store<AppState>;

/// Get the app store from context
pub fn use_app_store() -> AppStore {
    expect_context::<AppStore>()
}

// ========================
// Store Helper Functions
// ========================

/// Replace the mirrored catalog
pub fn store_set_catalog(store: &AppStore, catalog: &Catalog) {
    store.categories().set(catalog.categories().to_vec());
    store.total_spots().set(catalog.total_spots());
}

pub fn store_set_user(store: &AppStore, user: Option<&User>) {
    store.signed_in().set(user.is_some());
    store
        .user_email()
        .set(user.map(|u| u.email.clone().unwrap_or_else(|| u.id.to_string())));
}

pub fn store_set_error(store: &AppStore, error: impl Into<String>) {
    store.error().set(Some(error.into()));
}

pub fn store_clear_error(store: &AppStore) {
    store.error().set(None);
}
