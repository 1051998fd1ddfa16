//! Place Types
//!
//! Results of the external places API, reduced to what the client shows.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

/// A place picked by the user, ready to be saved as a spot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedPlace {
    pub name: String,
    pub address: String,
    pub lat: f64,
    pub lng: f64,
    pub place_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceReview {
    pub author_name: String,
    pub rating: f64,
    pub text: String,
    pub relative_time_description: String,
    pub profile_photo_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpeningHours {
    pub open_now: Option<bool>,
    pub weekday_text: Vec<String>,
}

/// Full place detail record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceDetails {
    pub name: String,
    pub address: String,
    pub types: Vec<String>,
    pub place_id: String,
    pub photo_url: Option<String>,
    pub rating: Option<f64>,
    pub user_ratings_total: Option<u32>,
    pub reviews: Vec<PlaceReview>,
    pub price_level: Option<u8>,
    pub website: Option<String>,
    pub phone: Option<String>,
    pub opening_hours: Option<OpeningHours>,
    pub location: Option<LatLng>,
}

impl PlaceDetails {
    /// Converts to a saveable selection; `None` when the place has no coordinates
    pub fn to_selected(&self) -> Option<SelectedPlace> {
        let location = self.location?;
        Some(SelectedPlace {
            name: self.name.clone(),
            address: self.address.clone(),
            lat: location.lat,
            lng: location.lng,
            place_id: self.place_id.clone(),
        })
    }
}

/// A search hit (nearby or text search)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceSummary {
    pub name: String,
    pub address: String,
    pub place_id: String,
    pub types: Vec<String>,
    pub location: Option<LatLng>,
}

/// An autocomplete suggestion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacePrediction {
    pub description: String,
    pub place_id: String,
    pub main_text: Option<String>,
    pub secondary_text: Option<String>,
    pub types: Vec<String>,
}
