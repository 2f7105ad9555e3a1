use axum::{
    Json,
    http::Uri,
    response::{Html, IntoResponse, Response},
};
use serde_json::{Value, json};
use unistay_auth::SessionView;

use crate::middleware::CurrentSession;
use crate::templates;

pub async fn healthz() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn home(session: CurrentSession) -> Html<String> {
    Html(templates::render_home(session.current().as_ref()))
}

pub async fn unauthorized() -> Html<String> {
    Html(templates::render_unauthorized())
}

/// Current session as JSON, without tokens.
pub async fn session_view(session: CurrentSession) -> Json<SessionView> {
    Json(session.snapshot().view())
}

/// Placeholder for every guarded area.
///
/// The middleware has already allowed the navigation, so a session is
/// present here.
pub async fn guarded_area(session: CurrentSession, uri: Uri) -> Response {
    match session.current() {
        Some(s) => Html(templates::render_area(&area_title(uri.path()), &s)).into_response(),
        None => axum::response::Redirect::to(&unistay_auth::guard::login_redirect(
            uri.path_and_query().map_or("/", |pq| pq.as_str()),
        ))
        .into_response(),
    }
}

/// "Dashboard / Landlord / Units" for `/dashboard/landlord/units`.
fn area_title(path: &str) -> String {
    let parts: Vec<String> = path
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|s| {
            let s = s.replace(['-', '_'], " ");
            let mut chars = s.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect();
    if parts.is_empty() {
        "UniStay".to_string()
    } else {
        parts.join(" / ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_area_title() {
        assert_eq!(
            area_title("/dashboard/landlord/units"),
            "Dashboard / Landlord / Units"
        );
        assert_eq!(area_title("/verification/"), "Verification");
        assert_eq!(area_title("/dashboard/agent/open-tasks"), "Dashboard / Agent / Open tasks");
        assert_eq!(area_title("/"), "UniStay");
    }
}
