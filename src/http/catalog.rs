use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use super::auth::RequireSession;
use super::error::Payload;
use crate::catalog::{
    self, Account, AccountPatch, App, AppPatch, Association, DeleteOutcome, NewAccount, NewApp,
    Settings,
};
use crate::error::AppResult;
use crate::listing::{self, FolderListing};
use crate::state::AppState;

#[derive(Debug, Serialize, TS)]
#[ts(export)]
pub struct ManageData {
    pub accounts: Vec<Account>,
    pub apps: Vec<App>,
    pub links: Vec<Association>,
}

#[derive(Debug, Clone, Copy, Deserialize, TS)]
#[ts(export)]
pub struct LinkRequest {
    #[ts(type = "number")]
    pub app_id: i64,
    #[ts(type = "number")]
    pub account_id: i64,
}

#[derive(Debug, Serialize, TS)]
#[ts(export)]
pub struct LinkResponse {
    pub changed: bool,
}

pub async fn grouped_apps(State(state): State<AppState>) -> AppResult<Json<FolderListing>> {
    Ok(Json(listing::grouped_listing(&state.pool).await?))
}

pub async fn list_accounts(State(state): State<AppState>) -> AppResult<Json<Vec<Account>>> {
    Ok(Json(catalog::list_all::<Account>(&state.pool).await?))
}

pub async fn manage_data(
    _session: RequireSession,
    State(state): State<AppState>,
) -> AppResult<Json<ManageData>> {
    Ok(Json(ManageData {
        accounts: catalog::list_all::<Account>(&state.pool).await?,
        apps: catalog::list_all::<App>(&state.pool).await?,
        links: catalog::list_links(&state.pool).await?,
    }))
}

pub async fn create_account(
    _session: RequireSession,
    State(state): State<AppState>,
    Payload(body): Payload<NewAccount>,
) -> AppResult<(StatusCode, Json<Account>)> {
    let account = catalog::create_account(&state.pool, body).await?;
    Ok((StatusCode::CREATED, Json(account)))
}

pub async fn update_account_settings(
    _session: RequireSession,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Payload(body): Payload<Settings>,
) -> AppResult<Json<Account>> {
    Ok(Json(catalog::update_settings::<Account>(&state.pool, id, body).await?))
}

pub async fn edit_account(
    _session: RequireSession,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Payload(body): Payload<AccountPatch>,
) -> AppResult<Json<Account>> {
    Ok(Json(catalog::edit_account(&state.pool, id, body).await?))
}

pub async fn delete_account(
    _session: RequireSession,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<DeleteOutcome>> {
    Ok(Json(catalog::delete::<Account>(&state.pool, id).await?))
}

pub async fn apps_for_account(
    _session: RequireSession,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Vec<App>>> {
    Ok(Json(catalog::apps_for_account(&state.pool, id).await?))
}

pub async fn create_app(
    _session: RequireSession,
    State(state): State<AppState>,
    Payload(body): Payload<NewApp>,
) -> AppResult<(StatusCode, Json<App>)> {
    let app = catalog::create_app(&state.pool, &state.config.folders, body).await?;
    Ok((StatusCode::CREATED, Json(app)))
}

pub async fn update_app_settings(
    _session: RequireSession,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Payload(body): Payload<Settings>,
) -> AppResult<Json<App>> {
    Ok(Json(catalog::update_settings::<App>(&state.pool, id, body).await?))
}

pub async fn edit_app(
    _session: RequireSession,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Payload(body): Payload<AppPatch>,
) -> AppResult<Json<App>> {
    Ok(Json(
        catalog::edit_app(&state.pool, &state.config.folders, id, body).await?,
    ))
}

pub async fn delete_app(
    _session: RequireSession,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<DeleteOutcome>> {
    Ok(Json(catalog::delete::<App>(&state.pool, id).await?))
}

pub async fn accounts_for_app(
    _session: RequireSession,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Vec<Account>>> {
    Ok(Json(catalog::accounts_for_app(&state.pool, id).await?))
}

pub async fn link(
    _session: RequireSession,
    State(state): State<AppState>,
    Payload(body): Payload<LinkRequest>,
) -> AppResult<Json<LinkResponse>> {
    let changed = catalog::link(&state.pool, body.app_id, body.account_id).await?;
    Ok(Json(LinkResponse { changed }))
}

pub async fn unlink(
    _session: RequireSession,
    State(state): State<AppState>,
    Payload(body): Payload<LinkRequest>,
) -> AppResult<Json<LinkResponse>> {
    let changed = catalog::unlink(&state.pool, body.app_id, body.account_id).await?;
    Ok(Json(LinkResponse { changed }))
}
