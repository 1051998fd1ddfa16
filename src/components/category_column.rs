//! Category Column Component
//!
//! The list of categories with their spots, plus the add-category input.

use leptos::prelude::*;
use leptos::task::spawn_local;

use crate::commands;
use crate::components::{DeleteConfirmButton, SpotItem};
use crate::context::use_app_context;
use crate::models::CategoryView;
use crate::store::{store_set_error, use_app_store, AppStateStoreFields};

/// Category add input
#[component]
fn CategoryAddInput() -> impl IntoView {
    let ctx = use_app_context();
    let app = use_app_store();

    let (new_name, set_new_name) = signal(String::new());

    let add_category = move |ev: web_sys::SubmitEvent| {
        ev.prevent_default();
        let name = new_name.get().trim().to_string();
        if name.is_empty() {
            return;
        }

        spawn_local(async move {
            match commands::add_category(ctx, &name).await {
                Ok(_) => set_new_name.set(String::new()),
                Err(e) => store_set_error(&app, e),
            }
        });
    };

    view! {
        <form class="category-add-form" on:submit=add_category>
            <input
                type="text"
                placeholder="New category..."
                prop:value=move || new_name.get()
                on:input=move |ev| set_new_name.set(event_target_value(&ev))
            />
            <button type="submit">"+"</button>
        </form>
    }
}

/// One category: header with toggle, reorder and delete, then its spots
#[component]
fn CategorySection(category: CategoryView, previous: Option<CategoryView>) -> impl IntoView {
    let ctx = use_app_context();
    let app = use_app_store();
    let id = category.id;

    let toggle = move |_| {
        spawn_local(async move {
            if let Err(e) = commands::toggle_category(ctx, id).await {
                store_set_error(&app, e);
            }
        });
    };

    let move_up = {
        let category = category.clone();
        move |_| {
            let Some(previous) = previous.clone() else { return };
            let category = category.clone();
            spawn_local(async move {
                if let Err(e) = commands::swap_categories(ctx, &category, &previous).await {
                    store_set_error(&app, e);
                }
            });
        }
    };

    let on_delete = Callback::new(move |_| {
        spawn_local(async move {
            if let Err(e) = commands::remove_category(ctx, id).await {
                store_set_error(&app, e);
            }
        });
    });

    let expanded = category.expanded;
    let count = category.spots.len();
    let spots = category.spots.clone();

    view! {
        <section class="category-section">
            <div class="category-header">
                <button class="category-expand-btn" on:click=toggle>
                    {if expanded { "▼" } else { "▶" }}
                </button>
                <span class="category-name">{category.name.clone()}</span>
                <span class="category-count">{count}</span>
                <button class="category-up-btn" title="Move up" on:click=move_up>"↑"</button>
                <DeleteConfirmButton
                    button_class="category-delete-btn"
                    label=category.name.clone()
                    on_confirm=on_delete
                />
            </div>
            <Show when=move || expanded>
                <ul class="spot-list">
                    {spots
                        .iter()
                        .enumerate()
                        .map(|(i, spot)| {
                            let previous = i.checked_sub(1).map(|p| spots[p].clone());
                            view! { <SpotItem spot=spot.clone() previous=previous /> }
                        })
                        .collect_view()}
                </ul>
                {(count == 0).then(|| view! { <p class="no-spots-message">"No spots yet"</p> })}
            </Show>
        </section>
    }
}

/// Category column
#[component]
pub fn CategoryColumn() -> impl IntoView {
    let app = use_app_store();

    view! {
        <div class="category-column">
            <div class="category-column-header">"Categories"</div>

            <CategoryAddInput />

            {move || {
                let categories = app.categories().get();
                if categories.is_empty() {
                    let text = if app.loading().get() { "Loading..." } else { "No categories yet" };
                    return view! { <div class="no-categories-message">{text}</div> }.into_any();
                }
                categories
                    .iter()
                    .enumerate()
                    .map(|(i, category)| {
                        let previous = i.checked_sub(1).map(|p| categories[p].clone());
                        view! { <CategorySection category=category.clone() previous=previous /> }
                    })
                    .collect_view()
                    .into_any()
            }}
        </div>
    }
}
