//! Places Client
//!
//! Lookups against the Google Places web service: details by id, nearby
//! search, text search and autocomplete.
//!
//! `OK` yields results, `ZERO_RESULTS` and `NOT_FOUND` yield nothing, and any
//! other status becomes [`DomainError::Places`].

use log::{debug, warn};
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize};

use crate::config::PlacesConfig;
use crate::domain::{LatLng, OpeningHours, PlaceDetails, PlacePrediction, PlaceReview, PlaceSummary};
use crate::error::{DomainError, DomainResult};
use crate::http::ensure_success;

pub const DEFAULT_NEARBY_RADIUS_M: u32 = 100;
const AUTOCOMPLETE_RADIUS_M: u32 = 50_000;
const MAX_REVIEWS: usize = 3;
const PHOTO_MAX_WIDTH: u32 = 400;
const PHOTO_MAX_HEIGHT: u32 = 300;

const DETAIL_FIELDS: &str = "name,formatted_address,types,geometry,place_id,photos,reviews,\
rating,user_ratings_total,price_level,website,formatted_phone_number,opening_hours";

// ========================
// Wire Types
// ========================

#[derive(Deserialize)]
struct Envelope {
    status: String,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Deserialize)]
struct DetailsResponse {
    result: Option<RawPlace>,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<RawPlace>,
}

#[derive(Deserialize)]
struct AutocompleteResponse {
    #[serde(default)]
    predictions: Vec<RawPrediction>,
}

#[derive(Deserialize)]
struct Geometry {
    location: LatLng,
}

#[derive(Deserialize)]
struct Photo {
    photo_reference: String,
}

#[derive(Deserialize)]
struct RawPlace {
    #[serde(default)]
    name: String,
    formatted_address: Option<String>,
    /// Nearby search returns a short address here instead
    vicinity: Option<String>,
    #[serde(default)]
    types: Vec<String>,
    #[serde(default)]
    place_id: String,
    geometry: Option<Geometry>,
    #[serde(default)]
    photos: Vec<Photo>,
    rating: Option<f64>,
    user_ratings_total: Option<u32>,
    #[serde(default)]
    reviews: Vec<PlaceReview>,
    price_level: Option<u8>,
    website: Option<String>,
    formatted_phone_number: Option<String>,
    opening_hours: Option<RawOpeningHours>,
}

#[derive(Deserialize)]
struct RawOpeningHours {
    open_now: Option<bool>,
    #[serde(default)]
    weekday_text: Vec<String>,
}

#[derive(Deserialize)]
struct RawPrediction {
    description: String,
    place_id: String,
    structured_formatting: Option<StructuredFormatting>,
    #[serde(default)]
    types: Vec<String>,
}

#[derive(Deserialize)]
struct StructuredFormatting {
    main_text: Option<String>,
    secondary_text: Option<String>,
}

impl RawPlace {
    fn address(&mut self) -> String {
        self.formatted_address
            .take()
            .or_else(|| self.vicinity.take())
            .unwrap_or_default()
    }

    fn into_summary(mut self) -> PlaceSummary {
        PlaceSummary {
            address: self.address(),
            name: self.name,
            place_id: self.place_id,
            types: self.types,
            location: self.geometry.map(|g| g.location),
        }
    }
}

impl From<RawPrediction> for PlacePrediction {
    fn from(raw: RawPrediction) -> Self {
        let (main_text, secondary_text) = match raw.structured_formatting {
            Some(f) => (f.main_text, f.secondary_text),
            None => (None, None),
        };
        Self {
            description: raw.description,
            place_id: raw.place_id,
            main_text,
            secondary_text,
            types: raw.types,
        }
    }
}

// ========================
// Client
// ========================

#[derive(Clone)]
pub struct PlacesClient {
    http: Client,
    config: PlacesConfig,
}

impl PlacesClient {
    pub fn new(config: PlacesConfig) -> Self {
        Self {
            http: Client::new(),
            config,
        }
    }

    pub fn config(&self) -> &PlacesConfig {
        &self.config
    }

    /// Full details for one place. An empty id answers `None` without a request.
    pub async fn place_details(&self, place_id: &str) -> DomainResult<Option<PlaceDetails>> {
        if place_id.is_empty() {
            return Ok(None);
        }
        let response: Option<DetailsResponse> = self
            .get("details", &[("place_id", place_id.to_string()), ("fields", DETAIL_FIELDS.to_string())])
            .await?;
        Ok(response
            .and_then(|r| r.result)
            .map(|place| self.details_from(place)))
    }

    /// Establishments around a point
    pub async fn search_nearby(&self, lat: f64, lng: f64, radius_m: Option<u32>) -> DomainResult<Vec<PlaceSummary>> {
        let radius = radius_m.unwrap_or(DEFAULT_NEARBY_RADIUS_M);
        let response: Option<SearchResponse> = self
            .get(
                "nearbysearch",
                &[
                    ("location", format!("{lat},{lng}")),
                    ("radius", radius.to_string()),
                    ("type", "establishment".to_string()),
                ],
            )
            .await?;
        Ok(response
            .map(|r| r.results.into_iter().map(RawPlace::into_summary).collect())
            .unwrap_or_default())
    }

    /// Best match for a free-text query
    pub async fn text_search(&self, query: &str) -> DomainResult<Option<PlaceSummary>> {
        let response: Option<SearchResponse> = self
            .get("textsearch", &[("query", query.to_string())])
            .await?;
        Ok(response
            .and_then(|r| r.results.into_iter().next())
            .map(RawPlace::into_summary))
    }

    /// Suggestions for partial input, biased towards `location` when given
    pub async fn autocomplete(&self, input: &str, location: Option<LatLng>) -> DomainResult<Vec<PlacePrediction>> {
        let mut params = vec![
            ("input", input.to_string()),
            ("types", "establishment|geocode".to_string()),
        ];
        if let Some(at) = location {
            params.push(("location", format!("{},{}", at.lat, at.lng)));
            params.push(("radius", AUTOCOMPLETE_RADIUS_M.to_string()));
        }
        let response: Option<AutocompleteResponse> = self.get("autocomplete", &params).await?;
        Ok(response
            .map(|r| r.predictions.into_iter().map(PlacePrediction::from).collect())
            .unwrap_or_default())
    }

    pub fn photo_url(&self, photo_reference: &str) -> String {
        format!(
            "{}/photo?maxwidth={PHOTO_MAX_WIDTH}&maxheight={PHOTO_MAX_HEIGHT}&photo_reference={photo_reference}&key={}",
            self.config.base_url, self.config.api_key
        )
    }

    fn details_from(&self, mut place: RawPlace) -> PlaceDetails {
        let mut reviews = std::mem::take(&mut place.reviews);
        reviews.truncate(MAX_REVIEWS);
        PlaceDetails {
            address: place.address(),
            photo_url: place.photos.first().map(|p| self.photo_url(&p.photo_reference)),
            name: place.name,
            types: place.types,
            place_id: place.place_id,
            rating: place.rating,
            user_ratings_total: place.user_ratings_total,
            reviews,
            price_level: place.price_level,
            website: place.website,
            phone: place.formatted_phone_number,
            opening_hours: place.opening_hours.map(|h| OpeningHours {
                open_now: h.open_now,
                weekday_text: h.weekday_text,
            }),
            location: place.geometry.map(|g| g.location),
        }
    }

    /// Calls `{base}/{endpoint}/json`. `None` when the service found nothing.
    async fn get<R: DeserializeOwned>(&self, endpoint: &str, params: &[(&str, String)]) -> DomainResult<Option<R>> {
        debug!("places: {endpoint}");
        let response = self
            .http
            .get(format!("{}/{endpoint}/json", self.config.base_url))
            .query(params)
            .query(&[("key", &self.config.api_key)])
            .send()
            .await?;
        let body: serde_json::Value = ensure_success(response).await?.json().await?;

        let envelope = Envelope::deserialize(&body)?;
        match envelope.status.as_str() {
            "OK" => Ok(Some(R::deserialize(&body)?)),
            "ZERO_RESULTS" | "NOT_FOUND" => Ok(None),
            _ => {
                let message = envelope.error_message.unwrap_or_default();
                warn!("places: {endpoint} failed with {}: {message}", envelope.status);
                Err(DomainError::Places {
                    status: envelope.status,
                    message,
                })
            }
        }
    }
}
