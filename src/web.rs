//! HTTP front controller.
//!
//! `GET /` renders the form; every other route performs one side effect on the
//! player and redirects back to `/`. Failures talking to mpv are logged by the
//! coordinator and never reach the browser.

use crate::ipc::{IpcCommand, OscVisibility, SEEK_STEP_SECS};
use crate::player::{PlayerError, PlayerHandle};
use crate::ui::IndexPage;
use axum::{
    extract::{Form, Query, State},
    response::Redirect,
    routing::get,
    Router,
};
use tracing::{debug, error};

#[derive(Clone)]
pub struct AppState {
    pub player: PlayerHandle,
}

/// Decoded `key=value` pairs of a query string or form body, in order.
type Pairs = Vec<(String, String)>;

/// First value for `key`, or the empty string when absent.
fn first_value(pairs: Pairs, key: &str) -> String {
    pairs
        .into_iter()
        .find_map(|(k, v)| (k == key).then_some(v))
        .unwrap_or_default()
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(show_form).post(submit_url))
        .route("/stop", get(stop).post(stop))
        .route("/toggle", get(toggle).post(toggle))
        .route("/seek", get(seek).post(seek))
        .route("/seek-backward", get(seek_backward).post(seek_backward))
        .route("/seek-forward", get(seek_forward).post(seek_forward))
        .route("/show-osc", get(show_osc).post(show_osc))
        .route("/hide-osc", get(hide_osc).post(hide_osc))
        .with_state(state)
}

async fn show_form(State(state): State<AppState>) -> IndexPage {
    IndexPage::new(&state.player.snapshot())
}

async fn submit_url(State(state): State<AppState>, form: Option<Form<Pairs>>) -> Redirect {
    let url = form
        .map(|Form(pairs)| first_value(pairs, "url"))
        .unwrap_or_default();
    if !url.trim().is_empty() {
        // launch in the background, the redirect does not wait for mpv
        let player = state.player.clone();
        tokio::spawn(async move {
            // spawn failures are logged by the coordinator
            if let Err(e @ PlayerError::Closed) = player.start(url).await {
                error!("error while starting player: {e}");
            }
        });
    }
    Redirect::to("/")
}

async fn stop(State(state): State<AppState>) -> Redirect {
    if let Err(e) = state.player.stop().await {
        error!("error while stopping player: {e}");
    }
    Redirect::to("/")
}

async fn relay(state: &AppState, command: IpcCommand) -> Redirect {
    if let Err(e) = state.player.send_command(command).await {
        debug!("control request dropped: {e}");
    }
    Redirect::to("/")
}

async fn toggle(State(state): State<AppState>) -> Redirect {
    relay(&state, IpcCommand::toggle_pause()).await
}

async fn seek(State(state): State<AppState>, Query(query): Query<Pairs>) -> Redirect {
    let position = first_value(query, "position");
    relay(&state, IpcCommand::seek_absolute_percent(&position)).await
}

async fn seek_backward(State(state): State<AppState>) -> Redirect {
    relay(&state, IpcCommand::seek_relative(-SEEK_STEP_SECS)).await
}

async fn seek_forward(State(state): State<AppState>) -> Redirect {
    relay(&state, IpcCommand::seek_relative(SEEK_STEP_SECS)).await
}

async fn show_osc(State(state): State<AppState>) -> Redirect {
    relay(&state, IpcCommand::osc_visibility(OscVisibility::Always)).await
}

async fn hide_osc(State(state): State<AppState>) -> Redirect {
    relay(&state, IpcCommand::osc_visibility(OscVisibility::Auto)).await
}
