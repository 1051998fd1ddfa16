//! Frontend Models
//!
//! The view types the components render, straight from the client library.

pub use spotbook_core::{
    CategoryId, CategoryView, LatLng, PlaceDetails, PlacePrediction, SelectedPlace, SpotId,
    SpotView,
};
