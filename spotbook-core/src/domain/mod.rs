//! Domain Layer
//!
//! Contains the remote row types and their write shapes.
//! This layer has no I/O; it only describes data.

mod entity;
mod category;
mod spot;
mod place;

pub use entity::{Entity, Table, CategoryId, SpotId, UserId};
pub use category::{Category, NewCategory, CategoryPatch};
pub use spot::{Spot, NewSpot, SpotPatch};
pub use place::{LatLng, OpeningHours, PlaceDetails, PlacePrediction, PlaceReview, PlaceSummary, SelectedPlace};
