//! Edge gating over real HTTP.

use briefly_gateway::identity::Identity;
use reqwest::Method;

mod common;
use common::TestGateway;

#[tokio::test]
async fn test_gated_page_redirects_to_sign_in() {
    let gw = TestGateway::start().await;

    let res = gw.get("/app/dashboard", None).await;
    assert_eq!(res.status(), 307);
    assert_eq!(res.headers()["location"], "/auth/signin?next=%2Fapp%2Fdashboard");
    assert_eq!(res.headers()["x-frame-options"], "DENY");
}

#[tokio::test]
async fn test_redirect_keeps_query_string() {
    let gw = TestGateway::start().await;

    let res = gw.get("/app/docs?id=7&view=full", None).await;
    assert_eq!(res.status(), 307);
    assert_eq!(
        res.headers()["location"],
        "/auth/signin?next=%2Fapp%2Fdocs%3Fid%3D7%26view%3Dfull"
    );
}

#[tokio::test]
async fn test_gated_page_with_session_renders() {
    let gw = TestGateway::start().await;
    let cookie = gw.sign_in(Identity::new("u1", "reader@example.com"));

    let res = gw.get("/app/dashboard", Some(&cookie)).await;
    assert_eq!(res.status(), 200);
    assert_eq!(res.headers()["x-content-type-options"], "nosniff");
    assert_eq!(res.headers()["referrer-policy"], "strict-origin-when-cross-origin");
    let page = res.text().await.unwrap();
    assert!(page.contains("reader@example.com"));
}

#[tokio::test]
async fn test_sign_in_page_is_public() {
    let gw = TestGateway::start().await;

    let res = gw.get("/auth/signin?next=%2Fapp%2Fdashboard", None).await;
    assert_eq!(res.status(), 200);
    assert!(res.text().await.unwrap().contains("/app/dashboard"));
}

#[tokio::test]
async fn test_api_preflight_is_204_without_session() {
    let gw = TestGateway::start().await;

    let res = gw
        .client
        .request(Method::OPTIONS, gw.url("/api/usage"))
        .header("origin", "http://localhost:3000")
        .header("access-control-request-method", "GET")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 204);
    assert_eq!(res.headers()["access-control-allow-origin"], "http://localhost:3000");
    assert_eq!(res.headers()["access-control-allow-credentials"], "true");
    assert!(res.headers().contains_key("access-control-allow-methods"));
    assert_eq!(res.headers()["x-xss-protection"], "1; mode=block");
    assert!(res.bytes().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_disallowed_origin_gets_no_cors_headers() {
    let gw = TestGateway::start().await;

    let res = gw
        .client
        .get(gw.url("/health"))
        .header("origin", "https://rekonnlabs.com.evil.example")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert!(!res.headers().contains_key("access-control-allow-origin"));
    assert_eq!(res.headers()["x-frame-options"], "DENY");
}

#[tokio::test]
async fn test_production_mode_uses_production_allow_list() {
    let gw = TestGateway::start_with(|c| c.deployment.production = true).await;

    let dev = gw
        .client
        .get(gw.url("/health"))
        .header("origin", "http://localhost:3000")
        .send()
        .await
        .unwrap();
    assert!(!dev.headers().contains_key("access-control-allow-origin"));

    let prod = gw
        .client
        .get(gw.url("/health"))
        .header("origin", "https://rekonnlabs.com")
        .send()
        .await
        .unwrap();
    assert_eq!(prod.headers()["access-control-allow-origin"], "https://rekonnlabs.com");
    assert_eq!(prod.headers()["vary"], "Origin");
}

#[tokio::test]
async fn test_refresh_rotates_expiring_session_without_redirect() {
    let gw = TestGateway::start().await;
    let (tokens, cookie) = gw.sign_in_expiring(Identity::new("u1", "a@example.com"), 10);

    let res = gw.get("/api/auth/refresh", Some(&cookie)).await;
    assert_eq!(res.status(), 200);
    let set_cookies: Vec<String> = res
        .headers()
        .get_all("set-cookie")
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect();
    assert_eq!(set_cookies.len(), 3);
    assert!(set_cookies.iter().any(|c| c.starts_with("sb-access-token=") && !c.contains(&tokens.access_token)));
    assert!(set_cookies.iter().all(|c| c.contains("HttpOnly")));

    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["authenticated"], true);
    assert_eq!(body["data"]["user"]["id"], "u1");
}

#[tokio::test]
async fn test_refresh_without_session_is_anonymous() {
    let gw = TestGateway::start().await;

    let res = gw.get("/api/auth/refresh", None).await;
    assert_eq!(res.status(), 200);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["data"]["authenticated"], false);
    assert!(body["data"].get("user").is_none());
}

#[tokio::test]
async fn test_identity_outage_is_generic_500() {
    let gw = TestGateway::start().await;
    let cookie = gw.sign_in(Identity::new("u1", "a@example.com"));
    gw.memory.sessions.set_unavailable(true);

    let res = gw.get("/app/dashboard", Some(&cookie)).await;
    assert_eq!(res.status(), 500);
    assert!(res.headers().contains_key("x-correlation-id"));
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"]["code"], "INTERNAL_ERROR");
    assert_eq!(body["error"]["message"], "An unexpected error occurred");
}

#[tokio::test]
async fn test_gate_reload_applies_to_next_request() {
    let gw = TestGateway::start().await;
    assert_eq!(gw.get("/health", None).await.status(), 200);

    let mut config = (*gw.state.config).clone();
    config.gating.gated_prefixes.push("/health".into());
    gw.state.reload_gate(&config);

    assert_eq!(gw.get("/health", None).await.status(), 307);
}
