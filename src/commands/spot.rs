//! Spot Commands

use crate::context::AppContext;
use crate::models::{CategoryId, SelectedPlace, SpotId, SpotView};

pub async fn add_spot(ctx: AppContext, category_id: CategoryId, place: &SelectedPlace) -> Result<SpotView, String> {
    ctx.store()
        .add_spot(category_id, place)
        .await
        .map_err(|e| e.to_string())
}

pub async fn remove_spot(ctx: AppContext, category_id: CategoryId, spot_id: SpotId) -> Result<(), String> {
    ctx.store()
        .remove_spot(category_id, spot_id)
        .await
        .map_err(|e| e.to_string())
}

pub async fn rename_spot(ctx: AppContext, spot_id: SpotId, name: &str) -> Result<(), String> {
    ctx.store()
        .rename_spot(spot_id, name)
        .await
        .map_err(|e| e.to_string())
}

pub async fn move_spot(ctx: AppContext, spot_id: SpotId, category_id: CategoryId) -> Result<(), String> {
    ctx.store()
        .move_spot(spot_id, category_id)
        .await
        .map_err(|e| e.to_string())
}

/// Swaps the positions of two spots in one category
pub async fn swap_spots(ctx: AppContext, a: &SpotView, b: &SpotView) -> Result<(), String> {
    ctx.store()
        .swap_spots(a.category_id, a.id, b.id)
        .await
        .map_err(|e| e.to_string())
}
