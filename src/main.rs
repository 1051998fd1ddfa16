#![allow(warnings)]
//! Spotbook Frontend Entry Point

mod models;
mod config;
mod logger;
mod persist;
mod realtime;
mod commands;
mod context;
mod store;
mod components;
mod app;

use app::App;
use leptos::prelude::*;

fn main() {
    console_error_panic_hook::set_once();
    logger::init();
    mount_to_body(App);
}
