use crate::ipc::SEEK_STEP_SECS;
use crate::player::SessionSnapshot;
use askama::Template;
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use tracing::error;

/// Buttons rendered under the URL form: path and label.
pub const CONTROLS: &[(&str, &str)] = &[
    ("/toggle", "Play/Pause"),
    ("/seek-backward", "Back"),
    ("/seek-forward", "Forward"),
    ("/show-osc", "Show controls"),
    ("/hide-osc", "Hide controls"),
    ("/stop", "Stop"),
];

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexPage {
    pub url: String,
    pub playing: bool,
    pub last_exit: Option<String>,
    pub seek_step: i32,
    pub controls: &'static [(&'static str, &'static str)],
}

impl IndexPage {
    pub fn new(snapshot: &SessionSnapshot) -> Self {
        Self {
            url: snapshot.current_url.clone(),
            playing: snapshot.is_playing(),
            last_exit: snapshot
                .last_exit
                .as_ref()
                .filter(|exit| !exit.requested)
                .map(ToString::to_string),
            seek_step: SEEK_STEP_SECS,
            controls: CONTROLS,
        }
    }
}

impl IntoResponse for IndexPage {
    fn into_response(self) -> Response {
        match self.render() {
            Ok(html) => Html(html).into_response(),
            Err(e) => {
                error!("error while rendering page: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("Template error: {e}"),
                )
                    .into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::ExitReport;

    #[test]
    fn idle_page_has_empty_url_field() {
        let html = IndexPage::new(&SessionSnapshot::default()).render().unwrap();
        assert!(html.contains(r#"name="url" value="""#));
        assert!(html.contains("Nothing playing"));
        for (path, _) in CONTROLS {
            assert!(html.contains(&format!(r#"action="{path}""#)), "missing {path}");
        }
    }

    #[test]
    fn current_url_is_prefilled_and_escaped() {
        let snapshot = SessionSnapshot {
            current_url: "https://example.com/watch?v=1&t=<2>".into(),
            pid: Some(7),
            last_exit: None,
        };
        let html = IndexPage::new(&snapshot).render().unwrap();
        assert!(html.contains("v=1&amp;t=&lt;2&gt;"));
        assert!(!html.contains("<2>"));
        assert!(!html.contains("Nothing playing"));
    }

    #[test]
    fn unexpected_exit_is_shown_but_kills_are_not() {
        let crashed = ExitReport {
            pid: Some(9),
            url: "u".into(),
            code: Some(2),
            signal: None,
            requested: false,
        };
        let snapshot = SessionSnapshot {
            last_exit: Some(crashed.clone()),
            ..SessionSnapshot::default()
        };
        let html = IndexPage::new(&snapshot).render().unwrap();
        assert!(html.contains("player (pid 9) exited with code 2"));

        let killed = SessionSnapshot {
            last_exit: Some(ExitReport {
                requested: true,
                ..crashed
            }),
            ..SessionSnapshot::default()
        };
        assert_eq!(IndexPage::new(&killed).last_exit, None);
    }
}
