//! Spotbook Frontend App
//!
//! Header with the signed-in user, the place search and the category column.
//! Signed-out users get the auth form.

use leptos::prelude::*;
use leptos::task::spawn_local;
use reactive_stores::Store;

use crate::commands;
use crate::components::{AuthForm, CategoryColumn, PlaceSearch};
use crate::context::AppContext;
use crate::store::{store_clear_error, store_set_error, AppState, AppStateStoreFields, AppStore};

#[component]
fn Header(ctx: AppContext, app: AppStore) -> impl IntoView {
    let sign_out = move |_| {
        spawn_local(async move {
            if let Err(e) = commands::sign_out(ctx).await {
                store_set_error(&app, e);
            }
        });
    };

    view! {
        <header class="app-header">
            <h1>"Spotbook"</h1>
            <Show when=move || app.signed_in().get()>
                <span class="spot-count">
                    {move || format!("{} spots in {} categories", app.total_spots().get(), app.categories().get().len())}
                </span>
                <span class="user-email">{move || app.user_email().get().unwrap_or_default()}</span>
                <button class="sign-out-btn" on:click=sign_out>"Sign out"</button>
            </Show>
        </header>
    }
}

#[component]
fn ErrorBanner(app: AppStore) -> impl IntoView {
    view! {
        {move || app.error().get().map(|e| view! {
            <div class="error-banner">
                <span>{e}</span>
                <button on:click=move |_| store_clear_error(&app)>"×"</button>
            </div>
        })}
    }
}

#[component]
pub fn App() -> impl IntoView {
    let app: AppStore = Store::new(AppState::default());
    provide_context(app);

    let ctx = match AppContext::new(app) {
        Ok(ctx) => ctx,
        Err(e) => {
            web_sys::console::error_1(&e.clone().into());
            return view! { <div class="config-error">{e}</div> }.into_any();
        }
    };
    provide_context(ctx);
    let has_places = ctx.places().is_some();

    view! {
        <div class="app-layout">
            <Header ctx=ctx app=app />
            <ErrorBanner app=app />
            <Show
                when=move || app.signed_in().get()
                fallback=|| view! { <AuthForm /> }
            >
                <main class="main-content">
                    {has_places.then(|| view! { <PlaceSearch /> })}
                    <CategoryColumn />
                </main>
            </Show>
        </div>
    }
    .into_any()
}
