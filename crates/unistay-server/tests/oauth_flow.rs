//! Social sign-in round trip against a mocked provider and backend.

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
    response::Response,
};
use serde_json::json;
use tower::ServiceExt;
use unistay_auth::identity::OAuthProviderConfig;
use unistay_server::{AppConfig, AppState, build_app};
use url::Url;
use wiremock::matchers::{body_json, body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn app_with_provider(backend: &MockServer, provider: &MockServer) -> Router {
    let mut cfg = AppConfig::default();
    cfg.auth.api_base_url = backend.uri();
    cfg.auth.session.secret = "oauth-flow-secret-oauth-flow-secret!".to_string();
    cfg.auth.oauth.providers.push(
        OAuthProviderConfig::new(
            "google",
            "Google",
            "client-123",
            format!("{}/authorize", provider.uri()),
            format!("{}/token", provider.uri()),
            format!("{}/userinfo", provider.uri()),
        )
        .with_client_secret("client-secret"),
    );
    let state = AppState::new(&cfg).expect("state");
    build_app(&cfg, state)
}

fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(c) = cookie {
        builder = builder.header(header::COOKIE, c);
    }
    builder.body(Body::empty()).expect("request")
}

fn location(res: &Response) -> String {
    res.headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

fn set_cookie(res: &Response, name: &str) -> Option<String> {
    res.headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with(&format!("{name}=")))
        .map(|v| v.split(';').next().unwrap_or_default().to_string())
}

/// Starts sign-in and returns the `state` parameter and the nonce cookie.
async fn start_signin(app: &Router, uri: &str) -> (String, String) {
    let res = app.clone().oneshot(get(uri, None)).await.unwrap();
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    let target = Url::parse(&location(&res)).expect("absolute provider URL");
    assert!(target.path().ends_with("/authorize"));
    let state = target
        .query_pairs()
        .find(|(k, _)| k == "state")
        .map(|(_, v)| v.into_owned())
        .expect("state parameter");
    let nonce = set_cookie(&res, "unistay.oauth_nonce").expect("nonce cookie");
    (state, nonce)
}

async fn mount_provider(provider: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("code=auth-code"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "provider-token",
            "token_type": "Bearer"
        })))
        .mount(provider)
        .await;
    Mock::given(method("GET"))
        .and(path("/userinfo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sub": "g-1",
            "email": "Ana@Example.com",
            "given_name": "Ana",
            "family_name": "Ruiz"
        })))
        .mount(provider)
        .await;
}

#[tokio::test]
async fn first_time_social_user_gets_requested_role() {
    let backend = MockServer::start().await;
    let provider = MockServer::start().await;
    mount_provider(&provider).await;
    Mock::given(method("POST"))
        .and(path("/api/users/social_login/"))
        .and(body_json(json!({
            "email": "ana@example.com",
            "first_name": "Ana",
            "last_name": "Ruiz",
            "provider": "google",
            "role": "landlord"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access": "access-token",
            "refresh": "refresh-token",
            "user": { "id": 11, "email": "ana@example.com", "role": "landlord" }
        })))
        .expect(1)
        .mount(&backend)
        .await;
    let app = app_with_provider(&backend, &provider);

    let (state, nonce) = start_signin(&app, "/auth/signin/google?role=landlord").await;
    let res = app
        .oneshot(get(
            &format!("/auth/callback/google?code=auth-code&state={state}"),
            Some(&nonce),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res), "/dashboard/landlord");
    assert!(set_cookie(&res, "unistay.session").is_some());
}

#[tokio::test]
async fn social_sign_in_without_role_defaults_to_student() {
    let backend = MockServer::start().await;
    let provider = MockServer::start().await;
    mount_provider(&provider).await;
    Mock::given(method("POST"))
        .and(path("/api/users/social_login/"))
        .and(body_string_contains("\"role\":\"student\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access": "access-token",
            "user": { "id": 12, "email": "ana@example.com", "role": "student" }
        })))
        .expect(1)
        .mount(&backend)
        .await;
    let app = app_with_provider(&backend, &provider);

    let (state, nonce) =
        start_signin(&app, "/auth/signin/google?callbackUrl=%2Fverification").await;
    let res = app
        .oneshot(get(
            &format!("/auth/callback/google?code=auth-code&state={state}"),
            Some(&nonce),
        ))
        .await
        .unwrap();
    assert_eq!(location(&res), "/verification");
}

#[tokio::test]
async fn callback_from_another_browser_is_rejected() {
    let backend = MockServer::start().await;
    let provider = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&provider)
        .await;
    let app = app_with_provider(&backend, &provider);

    let (state, _nonce) = start_signin(&app, "/auth/signin/google").await;
    let res = app
        .oneshot(get(
            &format!("/auth/callback/google?code=auth-code&state={state}"),
            Some("unistay.oauth_nonce=somebody-else"),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert!(set_cookie(&res, "unistay.session").is_none());
}

#[tokio::test]
async fn provider_denial_renders_error() {
    let backend = MockServer::start().await;
    let provider = MockServer::start().await;
    let app = app_with_provider(&backend, &provider);

    let res = app
        .oneshot(get(
            "/auth/callback/google?error=access_denied&error_description=User+cancelled",
            None,
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
}
