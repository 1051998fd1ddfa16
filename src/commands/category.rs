//! Category Commands

use crate::context::AppContext;
use crate::models::{CategoryId, CategoryView};

pub async fn add_category(ctx: AppContext, name: &str) -> Result<CategoryView, String> {
    ctx.store().add_category(name).await.map_err(|e| e.to_string())
}

pub async fn remove_category(ctx: AppContext, id: CategoryId) -> Result<(), String> {
    ctx.store().remove_category(id).await.map_err(|e| e.to_string())
}

pub async fn toggle_category(ctx: AppContext, id: CategoryId) -> Result<bool, String> {
    ctx.store()
        .toggle_category_expanded(id)
        .await
        .map_err(|e| e.to_string())
}

/// Swaps the positions of two categories. The list re-sorts once the
/// realtime updates come back.
pub async fn swap_categories(ctx: AppContext, a: &CategoryView, b: &CategoryView) -> Result<(), String> {
    ctx.store()
        .swap_categories(a.id, b.id)
        .await
        .map_err(|e| e.to_string())
}
