//! Realtime Merge
//!
//! Folds change notifications into a [`Catalog`]:
//! - INSERT is ignored when the id already exists (the create path's own echo)
//! - UPDATE overwrites the fields present in the snapshot, then re-sorts
//! - DELETE removes by id and is a no-op when absent

use log::{debug, warn};
use serde::{Deserialize, Deserializer};

use crate::domain::{Category, CategoryId, Spot, SpotId, Table};
use crate::error::DomainResult;
use crate::realtime::{ChangeKind, ChangeNotification};
use super::catalog::{Catalog, CategoryView, SpotView};

#[derive(Deserialize)]
struct RowKey<I> {
    id: I,
}

/// Partial category row; absent fields leave local values alone
#[derive(Deserialize)]
struct CategorySnapshot {
    id: CategoryId,
    name: Option<String>,
    display_order: Option<i32>,
    expanded: Option<bool>,
}

/// Partial spot row; `address`/`place_id` distinguish "absent" from "null"
#[derive(Deserialize)]
struct SpotSnapshot {
    id: SpotId,
    category_id: Option<CategoryId>,
    name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    address: Option<Option<String>>,
    lat: Option<f64>,
    lng: Option<f64>,
    #[serde(default, deserialize_with = "nullable")]
    place_id: Option<Option<String>>,
    display_order: Option<i32>,
}

fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn overwrite<T: PartialEq>(slot: &mut T, value: Option<T>) -> bool {
    match value {
        Some(value) if *slot != value => {
            *slot = value;
            true
        }
        _ => false,
    }
}

impl CategorySnapshot {
    fn apply(self, category: &mut CategoryView) -> bool {
        let mut changed = overwrite(&mut category.name, self.name);
        changed |= overwrite(&mut category.display_order, self.display_order);
        changed |= overwrite(&mut category.expanded, self.expanded);
        changed
    }
}

impl SpotSnapshot {
    /// Applies everything but the category move
    fn apply(&self, spot: &mut SpotView) -> bool {
        let mut changed = overwrite(&mut spot.name, self.name.clone());
        changed |= overwrite(
            &mut spot.address,
            self.address.clone().map(Option::unwrap_or_default),
        );
        changed |= overwrite(&mut spot.lat, self.lat);
        changed |= overwrite(&mut spot.lng, self.lng);
        changed |= overwrite(
            &mut spot.place_id,
            self.place_id.clone().map(Option::unwrap_or_default),
        );
        changed |= overwrite(&mut spot.display_order, self.display_order);
        changed
    }
}

impl Catalog {
    /// Merges one remote change. Returns whether local state changed.
    pub fn apply_change(&mut self, change: &ChangeNotification) -> DomainResult<bool> {
        let changed = match (change.table, change.kind) {
            (Table::Categories, ChangeKind::Insert) => match change.new_as::<Category>()? {
                Some(row) => self.insert_category(row.into()),
                None => missing_snapshot(change),
            },
            (Table::Categories, ChangeKind::Update) => match change.new_as::<CategorySnapshot>()? {
                Some(snapshot) => self.apply_category_snapshot(snapshot),
                None => missing_snapshot(change),
            },
            (Table::Categories, ChangeKind::Delete) => match deleted_id::<CategoryId>(change)? {
                Some(id) => self.remove_category(id),
                None => missing_snapshot(change),
            },
            (Table::Spots, ChangeKind::Insert) => match change.new_as::<Spot>()? {
                Some(row) => self.insert_spot(row.into()),
                None => missing_snapshot(change),
            },
            (Table::Spots, ChangeKind::Update) => match change.new_as::<SpotSnapshot>()? {
                Some(snapshot) => self.apply_spot_snapshot(snapshot),
                None => missing_snapshot(change),
            },
            (Table::Spots, ChangeKind::Delete) => match deleted_id::<SpotId>(change)? {
                Some(id) => self.remove_spot(id),
                None => missing_snapshot(change),
            },
        };
        debug!(
            "merge: {:?} on {} {}",
            change.kind,
            change.table,
            if changed { "applied" } else { "ignored" }
        );
        Ok(changed)
    }

    fn apply_category_snapshot(&mut self, snapshot: CategorySnapshot) -> bool {
        let changed = match self.category_mut(snapshot.id) {
            Some(category) => snapshot.apply(category),
            None => false,
        };
        if changed {
            self.sort_categories();
        }
        changed
    }

    fn apply_spot_snapshot(&mut self, snapshot: SpotSnapshot) -> bool {
        // Only move into a category we actually have
        let target = snapshot
            .category_id
            .filter(|id| self.category(*id).is_some());

        let mut changed = false;
        let mut moved: Option<SpotView> = None;
        for category in self.categories_mut() {
            let Some(index) = category.spots.iter().position(|s| s.id == snapshot.id) else {
                continue;
            };
            changed |= snapshot.apply(&mut category.spots[index]);
            match target {
                Some(target) if target != category.id => {
                    moved = Some(category.spots.remove(index));
                }
                _ => category.sort_spots(),
            }
        }

        if let (Some(mut spot), Some(target)) = (moved, target) {
            spot.category_id = target;
            self.insert_spot(spot);
            changed = true;
        }
        changed
    }
}

/// DELETE carries the key in `old`; fall back to `new` for backends that send it there
fn deleted_id<I: for<'de> Deserialize<'de>>(change: &ChangeNotification) -> DomainResult<Option<I>> {
    let key = match change.old_as::<RowKey<I>>()? {
        Some(key) => Some(key),
        None => change.new_as::<RowKey<I>>()?,
    };
    Ok(key.map(|k| k.id))
}

fn missing_snapshot(change: &ChangeNotification) -> bool {
    warn!(
        "merge: {:?} on {} without a usable snapshot, ignoring",
        change.kind, change.table
    );
    false
}

#[cfg(test)]
mod tests {
    use super::super::catalog::fixtures::*;
    use super::*;
    use serde_json::{json, to_value};

    fn notify(table: Table, kind: ChangeKind, new: Option<serde_json::Value>, old: Option<serde_json::Value>) -> ChangeNotification {
        ChangeNotification { table, kind, new, old }
    }

    fn seeded() -> Catalog {
        Catalog::from_rows(
            vec![category(1, "A", 0), category(2, "B", 1)],
            vec![spot(1, 1, "s1", 0), spot(2, 1, "s2", 1), spot(3, 2, "s3", 0)],
        )
    }

    #[test]
    fn test_repeated_category_insert_only_first_counts() {
        let mut catalog = Catalog::new();
        let first = category(5, "Food", 0);
        let mut second = first.clone();
        second.name = "Renamed in flight".into();

        let insert = |row: &Category| notify(Table::Categories, ChangeKind::Insert, Some(to_value(row).unwrap()), None);
        assert!(catalog.apply_change(&insert(&first)).unwrap());
        assert!(!catalog.apply_change(&insert(&second)).unwrap());
        assert!(!catalog.apply_change(&insert(&first)).unwrap());

        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.categories()[0].name, "Food");
    }

    #[test]
    fn test_repeated_spot_insert_only_first_counts() {
        let mut catalog = seeded();
        let row = spot(9, 2, "new", 5);
        let change = notify(Table::Spots, ChangeKind::Insert, Some(to_value(&row).unwrap()), None);
        assert!(catalog.apply_change(&change).unwrap());
        assert!(!catalog.apply_change(&change).unwrap());
        assert_eq!(catalog.category(cat_id(2)).unwrap().spots.len(), 2);
        assert_eq!(catalog.total_spots(), 4);
    }

    #[test]
    fn test_spot_insert_sorts_siblings() {
        let mut catalog = seeded();
        let row = spot(9, 1, "front", -1);
        catalog
            .apply_change(&notify(Table::Spots, ChangeKind::Insert, Some(to_value(&row).unwrap()), None))
            .unwrap();
        let names: Vec<_> = catalog.category(cat_id(1)).unwrap().spots.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["front", "s1", "s2"]);
    }

    #[test]
    fn test_repeated_delete_converges_to_absence() {
        let mut catalog = seeded();
        let delete = notify(Table::Spots, ChangeKind::Delete, None, Some(json!({ "id": spot_id(2) })));

        assert!(catalog.remove_spot_from(cat_id(1), spot_id(2)));
        assert!(!catalog.apply_change(&delete).unwrap());
        assert!(!catalog.apply_change(&delete).unwrap());
        assert!(catalog.spot(spot_id(2)).is_none());
        assert_eq!(catalog.total_spots(), 2);

        let delete_cat = notify(Table::Categories, ChangeKind::Delete, None, Some(json!({ "id": cat_id(2) })));
        assert!(catalog.apply_change(&delete_cat).unwrap());
        assert!(!catalog.apply_change(&delete_cat).unwrap());
        assert!(catalog.category(cat_id(2)).is_none());
    }

    #[test]
    fn test_delete_falls_back_to_new_snapshot() {
        let mut catalog = seeded();
        let delete = notify(Table::Categories, ChangeKind::Delete, Some(json!({ "id": cat_id(1) })), None);
        assert!(catalog.apply_change(&delete).unwrap());
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn test_name_only_update_touches_only_name() {
        let mut catalog = seeded();
        let before = catalog.spot(spot_id(1)).unwrap().clone();

        let update = notify(
            Table::Spots,
            ChangeKind::Update,
            Some(json!({ "id": spot_id(1), "name": "Renamed" })),
            None,
        );
        assert!(catalog.apply_change(&update).unwrap());

        let after = catalog.spot(spot_id(1)).unwrap();
        assert_eq!(after.name, "Renamed");
        assert_eq!(after.lat, before.lat);
        assert_eq!(after.lng, before.lng);
        assert_eq!(after.display_order, before.display_order);
        assert_eq!(after.address, before.address);
        assert_eq!(catalog.spot(spot_id(2)).unwrap().name, "s2");
    }

    #[test]
    fn test_update_null_address_clears_it() {
        let mut catalog = seeded();
        let update = notify(
            Table::Spots,
            ChangeKind::Update,
            Some(json!({ "id": spot_id(1), "address": null })),
            None,
        );
        assert!(catalog.apply_change(&update).unwrap());
        assert_eq!(catalog.spot(spot_id(1)).unwrap().address, "");
    }

    #[test]
    fn test_category_update_reorders() {
        let mut catalog = seeded();
        let update = notify(
            Table::Categories,
            ChangeKind::Update,
            Some(json!({ "id": cat_id(1), "display_order": 10, "expanded": false })),
            None,
        );
        assert!(catalog.apply_change(&update).unwrap());
        let first = &catalog.categories()[0];
        assert_eq!(first.id, cat_id(2));
        let moved = catalog.category(cat_id(1)).unwrap();
        assert_eq!(moved.name, "A");
        assert!(!moved.expanded);
    }

    #[test]
    fn test_update_for_unknown_id_is_ignored() {
        let mut catalog = seeded();
        let update = notify(
            Table::Categories,
            ChangeKind::Update,
            Some(json!({ "id": cat_id(42), "name": "ghost" })),
            None,
        );
        assert!(!catalog.apply_change(&update).unwrap());
        assert_eq!(catalog, seeded());
    }

    #[test]
    fn test_spot_update_moves_between_categories() {
        let mut catalog = seeded();
        let update = notify(
            Table::Spots,
            ChangeKind::Update,
            Some(json!({ "id": spot_id(1), "category_id": cat_id(2), "display_order": 3 })),
            None,
        );
        assert!(catalog.apply_change(&update).unwrap());
        assert!(catalog.category(cat_id(1)).unwrap().spot(spot_id(1)).is_none());
        let b = catalog.category(cat_id(2)).unwrap();
        let names: Vec<_> = b.spots.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["s3", "s1"]);
        assert_eq!(b.spots[1].category_id, cat_id(2));
    }

    #[test]
    fn test_spot_update_to_unknown_category_stays_put() {
        let mut catalog = seeded();
        let update = notify(
            Table::Spots,
            ChangeKind::Update,
            Some(json!({ "id": spot_id(1), "category_id": cat_id(77) })),
            None,
        );
        assert!(!catalog.apply_change(&update).unwrap());
        assert!(catalog.category(cat_id(1)).unwrap().spot(spot_id(1)).is_some());
    }

    #[test]
    fn test_insert_without_snapshot_is_ignored() {
        let mut catalog = seeded();
        let change = notify(Table::Categories, ChangeKind::Insert, None, None);
        assert!(!catalog.apply_change(&change).unwrap());
    }

    #[test]
    fn test_malformed_insert_is_a_decode_error() {
        let mut catalog = seeded();
        let change = notify(Table::Spots, ChangeKind::Insert, Some(json!({ "id": "not-a-uuid" })), None);
        assert!(catalog.apply_change(&change).is_err());
        assert_eq!(catalog, seeded());
    }
}
