//! JSON over HTTP. Handlers parse, call the catalog or the listing, and format;
//! nothing here decides business rules.

use std::future::Future;

use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Serialize;
use tokio::net::TcpListener;

use crate::state::AppState;

pub mod auth;
pub mod catalog;
pub mod error;

pub use error::{Payload, STORE_FAILURE_CODE};

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
}

async fn healthz() -> Json<Health> {
    Json(Health { status: "ok" })
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/manage/data", get(catalog::manage_data))
        .route(
            "/apps",
            get(catalog::grouped_apps).post(catalog::create_app),
        )
        .route(
            "/apps/:id",
            put(catalog::update_app_settings)
                .patch(catalog::edit_app)
                .delete(catalog::delete_app),
        )
        .route("/apps/:id/accounts", get(catalog::accounts_for_app))
        .route(
            "/accounts",
            get(catalog::list_accounts).post(catalog::create_account),
        )
        .route("/accounts/link", post(catalog::link))
        .route("/accounts/unlink", post(catalog::unlink))
        .route(
            "/accounts/:id",
            put(catalog::update_account_settings)
                .patch(catalog::edit_account)
                .delete(catalog::delete_account),
        )
        .route("/accounts/:id/apps", get(catalog::apps_for_account))
        .with_state(state)
}

/// Serves until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    tracing::info!(
        target: "accountdeck",
        event = "http_listening",
        addr = %addr,
        login_enabled = state.config.login_enabled
    );
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    tracing::info!(target: "accountdeck", event = "http_stopped");
    Ok(())
}
