//! Place Search Component
//!
//! Autocomplete search box. Picking a suggestion loads the place details and
//! offers to save it into a category.

use leptos::prelude::*;
use leptos::task::spawn_local;
use spotbook_core::format::{distance_km, escape_html, format_place_type, is_address_pattern};

use crate::commands;
use crate::context::use_app_context;
use crate::models::{CategoryView, LatLng, PlaceDetails, PlacePrediction};
use crate::store::{store_set_error, use_app_store, AppStateStoreFields};

const MIN_QUERY_LEN: usize = 2;

/// Closest saved spot to `at`, with its distance in km
fn nearest_spot(categories: &[CategoryView], at: LatLng) -> Option<(String, f64)> {
    categories
        .iter()
        .flat_map(|c| c.spots.iter())
        .map(|s| (s.name.clone(), distance_km(at.lat, at.lng, s.lat, s.lng)))
        .min_by(|a, b| a.1.total_cmp(&b.1))
}

#[component]
fn PlaceCard(
    details: PlaceDetails,
    on_saved: Callback<()>,
) -> impl IntoView {
    let ctx = use_app_context();
    let app = use_app_store();
    let (target, set_target) = signal(String::new());

    let kind = format_place_type(&details.types);
    // Geocoder hits often carry the street address as their name
    let title = if is_address_pattern(&details.name) { kind.clone() } else { details.name.clone() };
    let nearest = details
        .location
        .and_then(|at| nearest_spot(&app.categories().get_untracked(), at));
    let selected = details.to_selected();

    let save = move |_| {
        let Some(place) = selected.clone() else {
            store_set_error(&app, "This place has no location");
            return;
        };
        let categories = app.categories().get_untracked();
        let chosen = target.get();
        let Some(category) = categories
            .iter()
            .find(|c| c.id.to_string() == chosen)
            .or_else(|| categories.first())
        else {
            store_set_error(&app, "Create a category first");
            return;
        };
        let category_id = category.id;
        spawn_local(async move {
            match commands::add_spot(ctx, category_id, &place).await {
                Ok(_) => on_saved.run(()),
                Err(e) => store_set_error(&app, e),
            }
        });
    };

    view! {
        <div class="place-card">
            <h3 class="place-title">{title}</h3>
            <div class="place-type">{kind}</div>
            <div class="place-address">{details.address.clone()}</div>
            {details.rating.map(|r| view! {
                <div class="place-rating">
                    {format!("★ {r:.1}")}
                    {details.user_ratings_total.map(|n| format!(" ({n})"))}
                </div>
            })}
            {nearest.map(|(name, km)| view! {
                <div class="place-nearest">{format!("{km:.1} km from {name}")}</div>
            })}
            <ul class="place-reviews">
                {details.reviews.iter().map(|review| {
                    let body = escape_html(&review.text).replace('\n', "<br>");
                    view! {
                        <li class="place-review">
                            <span class="review-author">{review.author_name.clone()}</span>
                            <span class="review-when">{review.relative_time_description.clone()}</span>
                            <p class="review-text" inner_html=body></p>
                        </li>
                    }
                }).collect_view()}
            </ul>
            <div class="place-save-row">
                <select on:change=move |ev| set_target.set(event_target_value(&ev))>
                    {move || app.categories().get().into_iter()
                        .map(|c| view! { <option value=c.id.to_string()>{c.name}</option> })
                        .collect_view()}
                </select>
                <button class="place-save-btn" on:click=save>"Save spot"</button>
            </div>
        </div>
    }
}

#[component]
pub fn PlaceSearch() -> impl IntoView {
    let ctx = use_app_context();
    let app = use_app_store();

    let (query, set_query) = signal(String::new());
    let (predictions, set_predictions) = signal(Vec::<PlacePrediction>::new());
    let (details, set_details) = signal::<Option<PlaceDetails>>(None);

    let on_input = move |ev: web_sys::Event| {
        let text = event_target_value(&ev);
        set_query.set(text.clone());
        if text.chars().count() < MIN_QUERY_LEN {
            set_predictions.set(Vec::new());
            return;
        }
        spawn_local(async move {
            match commands::autocomplete(ctx, &text, None).await {
                // Drop answers for input the user has already changed
                Ok(found) if query.get_untracked() == text => set_predictions.set(found),
                Ok(_) => {}
                Err(e) => web_sys::console::log_1(&format!("[PLACES] {e}").into()),
            }
        });
    };

    let pick = move |place_id: String| {
        set_predictions.set(Vec::new());
        spawn_local(async move {
            match commands::place_details(ctx, &place_id).await {
                Ok(found) => set_details.set(found),
                Err(e) => store_set_error(&app, e),
            }
        });
    };

    let on_saved = Callback::new(move |_| {
        set_details.set(None);
        set_query.set(String::new());
    });

    view! {
        <div class="place-search">
            <input
                type="search"
                placeholder="Search places..."
                prop:value=move || query.get()
                on:input=on_input
            />
            <ul class="place-predictions">
                <For
                    each=move || predictions.get()
                    key=|p| p.place_id.clone()
                    children=move |p| {
                        let place_id = p.place_id.clone();
                        view! {
                            <li class="place-prediction" on:click=move |_| pick(place_id.clone())>
                                <span class="prediction-main">
                                    {p.main_text.clone().unwrap_or_else(|| p.description.clone())}
                                </span>
                                <span class="prediction-secondary">{p.secondary_text.clone()}</span>
                            </li>
                        }
                    }
                />
            </ul>
            {move || details.get().map(|d| view! { <PlaceCard details=d on_saved=on_saved /> })}
        </div>
    }
}
