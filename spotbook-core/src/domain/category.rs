//! Category Entity
//!
//! User-defined named group owning an ordered list of spots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::entity::{CategoryId, Entity, Table, UserId};

/// A category row as stored by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub user_id: UserId,
    pub name: String,
    /// Sorts sibling categories; not unique or contiguous
    pub display_order: i32,
    /// Whether the category is expanded in the UI
    #[serde(default)]
    pub expanded: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert shape; `user_id` is added by the repository
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCategory {
    pub name: String,
    pub display_order: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_order: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expanded: Option<bool>,
}

impl CategoryPatch {
    pub fn name(name: impl Into<String>) -> Self {
        Self { name: Some(name.into()), ..Default::default() }
    }

    pub fn display_order(order: i32) -> Self {
        Self { display_order: Some(order), ..Default::default() }
    }

    pub fn expanded(expanded: bool) -> Self {
        Self { expanded: Some(expanded), ..Default::default() }
    }
}

impl Entity for Category {
    type Id = CategoryId;
    type Draft = NewCategory;
    type Patch = CategoryPatch;

    const TABLE: Table = Table::Categories;

    fn id(&self) -> Self::Id {
        self.id
    }

    fn display_order(&self) -> i32 {
        self.display_order
    }

    fn from_draft(id: CategoryId, user_id: UserId, draft: &NewCategory, now: DateTime<Utc>) -> Self {
        Self {
            id,
            user_id,
            name: draft.name.clone(),
            display_order: draft.display_order,
            expanded: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn apply_patch(&mut self, patch: &CategoryPatch, now: DateTime<Utc>) {
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(order) = patch.display_order {
            self.display_order = order;
        }
        if let Some(expanded) = patch.expanded {
            self.expanded = expanded;
        }
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_patch_serializes_only_present_fields() {
        let json = serde_json::to_value(CategoryPatch::expanded(false)).unwrap();
        assert_eq!(json, serde_json::json!({ "expanded": false }));
    }

    #[test]
    fn test_apply_patch() {
        let now = Utc::now();
        let mut cat = Category::from_draft(
            CategoryId(Uuid::from_u128(1)),
            UserId(Uuid::from_u128(9)),
            &NewCategory { name: "Food".into(), display_order: 0 },
            now,
        );
        cat.apply_patch(&CategoryPatch::display_order(4), now);
        assert_eq!(cat.display_order, 4);
        assert_eq!(cat.name, "Food");
        assert!(cat.expanded);
    }

    #[test]
    fn test_deserialize_backend_row() {
        let row: Category = serde_json::from_str(
            r#"{
                "id": "00000000-0000-0000-0000-000000000001",
                "user_id": "00000000-0000-0000-0000-000000000009",
                "name": "Cafes",
                "display_order": 2,
                "expanded": false,
                "created_at": "2025-01-10T08:00:00.123456+00:00",
                "updated_at": "2025-01-10T08:00:00+00:00"
            }"#,
        )
        .unwrap();
        assert_eq!(row.name, "Cafes");
        assert_eq!(row.display_order, 2);
        assert!(!row.expanded);
    }
}
