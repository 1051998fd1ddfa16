//! UI Components
//!
//! Reusable Leptos components.

mod auth_form;
mod category_column;
mod delete_confirm_button;
mod place_search;
mod spot_item;

pub use auth_form::AuthForm;
pub use category_column::CategoryColumn;
pub use delete_confirm_button::DeleteConfirmButton;
pub use place_search::PlaceSearch;
pub use spot_item::SpotItem;
