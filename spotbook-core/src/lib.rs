//! Spotbook Client Library
//!
//! Layered architecture:
//! - domain: Core entities (categories, spots, places)
//! - repository: Remote data access (PostgREST) and an in-memory backend
//! - store: Local reconciliation store kept in sync with the backend
//! - realtime: Change-feed protocol and channel session
//! - auth / places: Thin clients for the auth and places APIs
//! - session: Explicit per-user sync context tying the pieces together

pub mod auth;
pub mod config;
pub mod domain;
pub mod error;
pub mod format;
mod http;
pub mod places;
pub mod realtime;
pub mod repository;
pub mod session;
pub mod store;

pub use auth::{AuthChange, AuthClient, AuthEvent, Session, SignUpOutcome, User};
pub use config::{BackendConfig, PlacesConfig};
pub use domain::{
    Category, CategoryId, CategoryPatch, Entity, LatLng, NewCategory, NewSpot, PlaceDetails,
    PlacePrediction, PlaceReview, PlaceSummary, SelectedPlace, Spot, SpotId, SpotPatch, Table,
    UserId,
};
pub use error::{DomainError, DomainResult};
pub use places::PlacesClient;
pub use realtime::{ChangeKind, ChangeNotification, RealtimeSession, Transport};
pub use repository::{Backend, MemoryBackend, MemoryRepository, Repository, RestBackend, RestRepository};
pub use session::{StopHandle, SyncSession};
pub use store::{Catalog, CategoryView, SpotStore, SpotView};

#[cfg(test)]
pub(crate) mod testing {
    //! Throwaway HTTP servers for exercising the remote clients.

    /// Serves `router` on an ephemeral local port and returns its base URL
    pub async fn serve(router: axum::Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }
}
