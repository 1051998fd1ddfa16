//! Spot Entity
//!
//! A saved place with coordinates, owned by exactly one category.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::entity::{CategoryId, Entity, SpotId, Table, UserId};

/// A spot row as stored by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spot {
    pub id: SpotId,
    pub category_id: CategoryId,
    pub user_id: UserId,
    pub name: String,
    pub address: Option<String>,
    pub lat: f64,
    pub lng: f64,
    /// Identifier of the place in the external places API
    pub place_id: Option<String>,
    pub display_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert shape; `user_id` is added by the repository
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSpot {
    pub category_id: CategoryId,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    pub lat: f64,
    pub lng: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub place_id: Option<String>,
    pub display_order: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpotPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_order: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<CategoryId>,
}

impl SpotPatch {
    pub fn name(name: impl Into<String>) -> Self {
        Self { name: Some(name.into()), ..Default::default() }
    }

    pub fn display_order(order: i32) -> Self {
        Self { display_order: Some(order), ..Default::default() }
    }

    pub fn category(category_id: CategoryId) -> Self {
        Self { category_id: Some(category_id), ..Default::default() }
    }
}

impl Entity for Spot {
    type Id = SpotId;
    type Draft = NewSpot;
    type Patch = SpotPatch;

    const TABLE: Table = Table::Spots;

    fn id(&self) -> Self::Id {
        self.id
    }

    fn display_order(&self) -> i32 {
        self.display_order
    }

    fn from_draft(id: SpotId, user_id: UserId, draft: &NewSpot, now: DateTime<Utc>) -> Self {
        Self {
            id,
            category_id: draft.category_id,
            user_id,
            name: draft.name.clone(),
            address: draft.address.clone(),
            lat: draft.lat,
            lng: draft.lng,
            place_id: draft.place_id.clone(),
            display_order: draft.display_order,
            created_at: now,
            updated_at: now,
        }
    }

    fn apply_patch(&mut self, patch: &SpotPatch, now: DateTime<Utc>) {
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(address) = &patch.address {
            self.address = Some(address.clone());
        }
        if let Some(order) = patch.display_order {
            self.display_order = order;
        }
        if let Some(category_id) = patch.category_id {
            self.category_id = category_id;
        }
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nullable_columns() {
        let row: Spot = serde_json::from_str(
            r#"{
                "id": "00000000-0000-0000-0000-000000000010",
                "category_id": "00000000-0000-0000-0000-000000000001",
                "user_id": "00000000-0000-0000-0000-000000000009",
                "name": "Blue Bottle",
                "address": null,
                "lat": 35.68,
                "lng": 139.76,
                "place_id": null,
                "display_order": 0,
                "created_at": "2025-01-10T08:00:00Z",
                "updated_at": "2025-01-10T08:00:00Z"
            }"#,
        )
        .unwrap();
        assert!(row.address.is_none());
        assert!(row.place_id.is_none());
    }

    #[test]
    fn test_new_spot_omits_missing_optionals() {
        let draft = NewSpot {
            category_id: CategoryId(uuid::Uuid::from_u128(1)),
            name: "Park".into(),
            address: None,
            lat: 1.0,
            lng: 2.0,
            place_id: None,
            display_order: 3,
        };
        let json = serde_json::to_value(&draft).unwrap();
        assert!(json.get("address").is_none());
        assert!(json.get("place_id").is_none());
        assert_eq!(json["display_order"], 3);
    }
}
