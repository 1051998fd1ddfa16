//! Spot Item Component
//!
//! One saved spot: name (double-click to rename), address, reorder and move
//! controls, delete.

use leptos::prelude::*;
use leptos::task::spawn_local;

use crate::commands;
use crate::components::DeleteConfirmButton;
use crate::context::use_app_context;
use crate::models::SpotView;
use crate::store::{store_set_error, use_app_store, AppStateStoreFields};

#[component]
pub fn SpotItem(
    spot: SpotView,
    /// The spot shown above this one, for moving up
    previous: Option<SpotView>,
) -> impl IntoView {
    let ctx = use_app_context();
    let app = use_app_store();

    let id = spot.id;
    let category_id = spot.category_id;
    let (editing, set_editing) = signal(false);
    let (draft, set_draft) = signal(spot.name.clone());

    let commit_rename = move || {
        set_editing.set(false);
        let name = draft.get().trim().to_string();
        if name.is_empty() {
            return;
        }
        spawn_local(async move {
            if let Err(e) = commands::rename_spot(ctx, id, &name).await {
                store_set_error(&app, e);
            }
        });
    };

    let move_up = {
        let spot = spot.clone();
        move |_| {
            let Some(previous) = previous.clone() else { return };
            let spot = spot.clone();
            spawn_local(async move {
                if let Err(e) = commands::swap_spots(ctx, &spot, &previous).await {
                    store_set_error(&app, e);
                }
            });
        }
    };

    let move_to = move |ev: web_sys::Event| {
        let target = event_target_value(&ev);
        let Some(category) = app
            .categories()
            .get_untracked()
            .into_iter()
            .find(|c| c.id.to_string() == target)
        else {
            return;
        };
        spawn_local(async move {
            if let Err(e) = commands::move_spot(ctx, id, category.id).await {
                store_set_error(&app, e);
            }
        });
    };

    let on_delete = Callback::new(move |_| {
        spawn_local(async move {
            if let Err(e) = commands::remove_spot(ctx, category_id, id).await {
                store_set_error(&app, e);
            }
        });
    });

    let name = spot.name.clone();
    view! {
        <li class="spot-item">
            {move || if editing.get() {
                view! {
                    <input
                        class="spot-rename-input"
                        prop:value=move || draft.get()
                        on:input=move |ev| set_draft.set(event_target_value(&ev))
                        on:blur=move |_| commit_rename()
                        on:keydown=move |ev| {
                            if ev.key() == "Enter" {
                                commit_rename();
                            } else if ev.key() == "Escape" {
                                set_editing.set(false);
                            }
                        }
                    />
                }.into_any()
            } else {
                let name = name.clone();
                view! {
                    <span class="spot-name" on:dblclick=move |_| set_editing.set(true)>{name}</span>
                }.into_any()
            }}
            <span class="spot-address">{spot.address.clone()}</span>
            <button class="spot-up-btn" title="Move up" on:click=move_up>"↑"</button>
            <select class="spot-move-select" on:change=move_to>
                <option value="" selected=true>"Move to…"</option>
                {move || app.categories().get().into_iter()
                    .filter(|c| c.id != category_id)
                    .map(|c| view! { <option value=c.id.to_string()>{c.name}</option> })
                    .collect_view()}
            </select>
            <DeleteConfirmButton button_class="spot-delete-btn" label=spot.name.clone() on_confirm=on_delete />
        </li>
    }
}
