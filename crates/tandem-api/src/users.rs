use axum::{
    Extension, Json,
    extract::{Path, Query, State},
};
use tracing::debug;

use tandem_db::UserSearch;
use tandem_types::api::UsersQuery;
use tandem_types::models::{ProfileView, ToggleFollowOutput};

use crate::auth::AppState;
use crate::blocking;
use crate::error::ApiError;
use crate::middleware::Viewer;

pub async fn list_users(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Query(query): Query<UsersQuery>,
) -> Result<Json<Vec<ProfileView>>, ApiError> {
    let users = blocking(&state, move |app, cancel| {
        let search = UserSearch {
            search: &query.search,
            first: query.first(),
            after: &query.after,
        };
        Ok(app.db.search_users(cancel, viewer.0, search)?)
    })
    .await?;

    Ok(Json(users))
}

pub async fn get_user(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Path(username): Path<String>,
) -> Result<Json<ProfileView>, ApiError> {
    let profile =
        blocking(&state, move |app, cancel| Ok(app.db.get_profile(cancel, viewer.0, &username)?)).await?;
    Ok(Json(profile))
}

pub async fn toggle_follow(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Path(username): Path<String>,
) -> Result<Json<ToggleFollowOutput>, ApiError> {
    let target = username.clone();
    let out =
        blocking(&state, move |app, cancel| Ok(app.db.toggle_follow(cancel, viewer.0, &target)?)).await?;

    if out.following {
        // Hook point for new-follower notifications, which are not delivered yet.
        debug!(follower = ?viewer.0, followee = %username, "new follower");
    }

    Ok(Json(out))
}
