//! Domain Layer - Core Entity Trait
//!
//! Every row type stored in a backend table implements [`Entity`].

use std::fmt;
use std::hash::Hash;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new_v4() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

id_type!(
    /// Category identifier
    CategoryId
);
id_type!(
    /// Spot identifier
    SpotId
);
id_type!(
    /// Authenticated user identifier
    UserId
);

/// Backend tables this client reads and writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Table {
    Categories,
    Spots,
}

impl Table {
    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Categories => "categories",
            Table::Spots => "spots",
        }
    }

    /// Name of the realtime channel carrying this table's changes
    pub fn channel_name(&self) -> &'static str {
        match self {
            Table::Categories => "categories-changes",
            Table::Spots => "spots-changes",
        }
    }

}

impl FromStr for Table {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "categories" => Ok(Table::Categories),
            "spots" => Ok(Table::Spots),
            other => Err(DomainError::NotFound(format!("table {other}"))),
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Core trait for all rows owned by a user
pub trait Entity: Sized + Clone + Serialize + DeserializeOwned + 'static {
    /// The type of the entity's unique identifier
    type Id: Copy + Eq + Hash + fmt::Display + fmt::Debug + From<Uuid> + Serialize + DeserializeOwned;
    /// Fields supplied by the client on insert
    type Draft: Serialize;
    /// Partial update; absent fields are left untouched
    type Patch: Serialize;

    const TABLE: Table;

    /// Returns the entity's unique identifier
    fn id(&self) -> Self::Id;

    fn display_order(&self) -> i32;

    /// Builds the row the backend would return for an insert
    fn from_draft(id: Self::Id, user_id: UserId, draft: &Self::Draft, now: DateTime<Utc>) -> Self;

    /// Applies a partial update, stamping `updated_at`
    fn apply_patch(&mut self, patch: &Self::Patch, now: DateTime<Utc>);
}
