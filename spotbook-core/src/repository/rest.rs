//! REST Repository
//!
//! PostgREST-backed implementation of [`Repository`]. Rows are scoped to the
//! signed-in user by the backend's row-level security; the client only sends
//! its token.

use std::marker::PhantomData;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::debug;
use reqwest::{header::ACCEPT, RequestBuilder};
use serde::Serialize;

use crate::auth::AuthClient;
use crate::domain::{Category, Entity, Spot, UserId};
use crate::error::{DomainError, DomainResult};
use crate::http::ensure_success;
use super::traits::{Backend, Repository};

const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";
const RETURN_ROW: &str = "return=representation";

/// Insert body: the draft plus the owning user
#[derive(Serialize)]
struct Owned<'a, D> {
    user_id: UserId,
    #[serde(flatten)]
    draft: &'a D,
}

/// Update body: the patch plus a fresh `updated_at`
#[derive(Serialize)]
struct Stamped<'a, P> {
    #[serde(flatten)]
    patch: &'a P,
    updated_at: DateTime<Utc>,
}

pub struct RestRepository<T> {
    auth: AuthClient,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Entity> RestRepository<T> {
    pub fn new(auth: AuthClient) -> Self {
        Self {
            auth,
            _entity: PhantomData,
        }
    }

    fn url(&self) -> String {
        self.auth.config().rest_url(T::TABLE)
    }

    /// Adds the project key and the caller's token (anon key when signed out)
    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let config = self.auth.config();
        let token = self
            .auth
            .access_token()
            .unwrap_or_else(|| config.anon_key.clone());
        request.header("apikey", &config.anon_key).bearer_auth(token)
    }

    fn id_filter(id: T::Id) -> [(&'static str, String); 1] {
        [("id", format!("eq.{id}"))]
    }
}

#[async_trait(?Send)]
impl<T: Entity> Repository<T> for RestRepository<T> {
    async fn list(&self) -> DomainResult<Vec<T>> {
        debug!("rest: list {}", T::TABLE);
        let request = self
            .auth
            .http()
            .get(self.url())
            .query(&[("select", "*"), ("order", "display_order.asc")]);
        let response = self.authorize(request).send().await?;
        Ok(ensure_success(response).await?.json().await?)
    }

    async fn create(&self, draft: &T::Draft) -> DomainResult<T> {
        let user = self.auth.current_user().ok_or(DomainError::Unauthenticated)?;
        debug!("rest: insert into {}", T::TABLE);
        let request = self
            .auth
            .http()
            .post(self.url())
            .header("Prefer", RETURN_ROW)
            .header(ACCEPT, SINGLE_OBJECT)
            .json(&Owned { user_id: user.id, draft });
        let response = self.authorize(request).send().await?;
        Ok(ensure_success(response).await?.json().await?)
    }

    async fn update(&self, id: T::Id, patch: &T::Patch) -> DomainResult<T> {
        debug!("rest: update {} {id}", T::TABLE);
        let request = self
            .auth
            .http()
            .patch(self.url())
            .query(&Self::id_filter(id))
            .header("Prefer", RETURN_ROW)
            .header(ACCEPT, SINGLE_OBJECT)
            .json(&Stamped { patch, updated_at: Utc::now() });
        let response = self.authorize(request).send().await?;
        Ok(ensure_success(response).await?.json().await?)
    }

    async fn delete(&self, id: T::Id) -> DomainResult<()> {
        debug!("rest: delete {} {id}", T::TABLE);
        let request = self
            .auth
            .http()
            .delete(self.url())
            .query(&Self::id_filter(id));
        let response = self.authorize(request).send().await?;
        ensure_success(response).await?;
        Ok(())
    }
}

/// Both tables over the hosted REST API
pub struct RestBackend {
    categories: RestRepository<Category>,
    spots: RestRepository<Spot>,
}

impl RestBackend {
    pub fn new(auth: AuthClient) -> Self {
        Self {
            categories: RestRepository::new(auth.clone()),
            spots: RestRepository::new(auth),
        }
    }
}

impl Backend for RestBackend {
    type Categories = RestRepository<Category>;
    type Spots = RestRepository<Spot>;

    fn categories(&self) -> &Self::Categories {
        &self.categories
    }

    fn spots(&self) -> &Self::Spots {
        &self.spots
    }
}
