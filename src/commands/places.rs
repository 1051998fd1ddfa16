//! Places Commands
//!
//! Lookups used by the search box. Without a places key these fail with a
//! message instead of calling out.

use spotbook_core::PlacesClient;

use crate::context::AppContext;
use crate::models::{LatLng, PlaceDetails, PlacePrediction};

fn client(ctx: AppContext) -> Result<PlacesClient, String> {
    ctx.places().ok_or_else(|| "Place search is not configured".to_string())
}

pub async fn autocomplete(ctx: AppContext, input: &str, near: Option<LatLng>) -> Result<Vec<PlacePrediction>, String> {
    client(ctx)?
        .autocomplete(input, near)
        .await
        .map_err(|e| e.to_string())
}

pub async fn place_details(ctx: AppContext, place_id: &str) -> Result<Option<PlaceDetails>, String> {
    client(ctx)?
        .place_details(place_id)
        .await
        .map_err(|e| e.to_string())
}
