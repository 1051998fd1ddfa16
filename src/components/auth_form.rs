//! Auth Form Component
//!
//! Email/password sign-in and sign-up, plus Google sign-in.

use leptos::prelude::*;
use leptos::task::spawn_local;

use crate::commands;
use crate::context::use_app_context;

#[component]
pub fn AuthForm() -> impl IntoView {
    let ctx = use_app_context();

    let (email, set_email) = signal(String::new());
    let (password, set_password) = signal(String::new());
    let (signing_up, set_signing_up) = signal(false);
    let (busy, set_busy) = signal(false);
    let (message, set_message) = signal::<Option<String>>(None);

    // Pick up a session handed back by the OAuth redirect
    spawn_local(async move {
        if let Err(e) = commands::complete_oauth_redirect(ctx).await {
            set_message.set(Some(e));
        }
    });

    let submit = move |ev: web_sys::SubmitEvent| {
        ev.prevent_default();
        let email = email.get();
        let password = password.get();
        if email.is_empty() || password.is_empty() {
            return;
        }
        let sign_up = signing_up.get();
        set_busy.set(true);
        set_message.set(None);

        spawn_local(async move {
            let result = if sign_up {
                commands::sign_up(ctx, &email, &password).await.map(|needs_confirmation| {
                    needs_confirmation.then(|| "Check your email to confirm your account.".to_string())
                })
            } else {
                commands::sign_in(ctx, &email, &password).await.map(|_| None)
            };
            match result {
                Ok(note) => {
                    set_password.set(String::new());
                    set_message.set(note);
                }
                Err(e) => {
                    web_sys::console::log_1(&format!("[AUTH] {e}").into());
                    set_message.set(Some(e));
                }
            }
            set_busy.set(false);
        });
    };

    let google = move |_| {
        if let Err(e) = commands::sign_in_with_google(ctx) {
            set_message.set(Some(e));
        }
    };

    view! {
        <div class="auth-panel">
            <h2>{move || if signing_up.get() { "Create account" } else { "Sign in" }}</h2>
            <form class="auth-form" on:submit=submit>
                <input
                    type="email"
                    placeholder="Email"
                    prop:value=move || email.get()
                    on:input=move |ev| set_email.set(event_target_value(&ev))
                />
                <input
                    type="password"
                    placeholder="Password"
                    prop:value=move || password.get()
                    on:input=move |ev| set_password.set(event_target_value(&ev))
                />
                <button type="submit" disabled=move || busy.get()>
                    {move || if signing_up.get() { "Sign up" } else { "Sign in" }}
                </button>
            </form>
            <button class="google-btn" on:click=google>"Continue with Google"</button>
            <button
                class="link-btn"
                on:click=move |_| set_signing_up.update(|v| *v = !*v)
            >
                {move || if signing_up.get() { "Have an account? Sign in" } else { "New here? Create an account" }}
            </button>
            {move || message.get().map(|m| view! { <p class="auth-message">{m}</p> })}
        </div>
    }
}
