//! Protected handlers over real HTTP.

use briefly_gateway::identity::{Identity, Role};
use briefly_gateway::quota::{QuotaKind, Tier};
use serde_json::{json, Value};

mod common;
use common::{start_programmable_backend, TestGateway};

#[tokio::test]
async fn test_usage_requires_session() {
    let gw = TestGateway::start().await;

    let res = gw.get("/api/usage", None).await;
    assert_eq!(res.status(), 401);
    let correlation = res.headers()["x-correlation-id"].to_str().unwrap().to_string();
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
    assert_eq!(body["correlationId"], correlation.as_str());
}

#[tokio::test]
async fn test_usage_snapshot() {
    let gw = TestGateway::start().await;
    let cookie = gw.sign_in(Identity::new("u1", "a@example.com"));
    gw.memory.quotas.set_usage("u1", QuotaKind::Documents, 9);

    let res = gw.get("/api/usage", Some(&cookie)).await;
    assert_eq!(res.status(), 200);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["data"]["tier"], "free");
    assert_eq!(body["data"]["warnings"][0], "Document limit almost reached");
    let storage = body["data"]["usage"]
        .as_array()
        .unwrap()
        .iter()
        .find(|u| u["kind"] == "storage_bytes")
        .unwrap();
    assert_eq!(storage["limitFormatted"], "100.0 MB");
}

#[tokio::test]
async fn test_api_calls_are_metered() {
    let gw = TestGateway::start().await;
    let cookie = gw.sign_in(Identity::new("u1", "a@example.com"));

    let res = gw.get("/api/usage", Some(&cookie)).await;
    assert_eq!(res.status(), 200);
    assert_eq!(res.headers()["x-usage-current"], "0");
    assert_eq!(res.headers()["x-usage-tier"], "free");
    let body: Value = res.json().await.unwrap();
    let api = body["data"]["usage"]
        .as_array()
        .unwrap()
        .iter()
        .find(|u| u["kind"] == "api_calls")
        .unwrap()
        .clone();
    assert_eq!(api["used"], 1);

    // Public and session endpoints are not counted.
    gw.get("/api/usage/tiers", None).await;
    gw.get("/api/auth/refresh", Some(&cookie)).await;
    let res = gw.get("/api/support/tickets", Some(&cookie)).await;
    assert_eq!(res.headers()["x-usage-current"], "1");
}

#[tokio::test]
async fn test_api_call_limit_is_enforced() {
    let gw = TestGateway::start().await;
    let cookie = gw.sign_in(Identity::new("u1", "a@example.com"));
    gw.memory.quotas.set_usage("u1", QuotaKind::ApiCalls, 999);

    let res = gw.get("/api/support/tickets", Some(&cookie)).await;
    assert_eq!(res.status(), 200);
    assert_eq!(res.headers()["x-usage-current"], "999");
    assert_eq!(res.headers()["x-usage-limit"], "1000");
    assert_eq!(res.headers()["x-usage-remaining"], "1");
    assert_eq!(res.headers()["x-usage-warning"], "approaching_limit");

    let res = gw.get("/api/support/tickets", Some(&cookie)).await;
    assert_eq!(res.status(), 429);
    assert_eq!(res.headers()["retry-after"], "3600");
    assert_eq!(res.headers()["x-usage-limit-exceeded"], "api_calls");
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"]["code"], "USAGE_LIMIT_EXCEEDED");
    assert_eq!(body["error"]["details"]["limitType"], "api_calls");
    assert_eq!(body["error"]["details"]["upgradeRequired"], true);
}

#[tokio::test]
async fn test_rate_limit_rejects_sixth_ticket() {
    let gw = TestGateway::start().await;
    let cookie = gw.sign_in(Identity::new("u1", "a@example.com"));
    let ticket = json!({ "subject": "Upload fails", "message": "The PDF upload stops at 90 percent." });

    for _ in 0..5 {
        let res = gw.post_json("/api/support/tickets", Some(&cookie), ticket.clone()).await;
        assert_eq!(res.status(), 200);
    }
    let res = gw.post_json("/api/support/tickets", Some(&cookie), ticket).await;
    assert_eq!(res.status(), 429);
    assert!(res.headers().contains_key("retry-after"));
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"]["code"], "RATE_LIMITED");
}

#[tokio::test]
async fn test_configured_rate_limit_one_per_window() {
    let gw = TestGateway::start_with(|c| {
        c.rate_limit.points = 1;
        c.rate_limit.duration_secs = 60;
    })
    .await;
    let cookie = gw.sign_in(Identity::new("u1", "a@example.com"));

    assert_eq!(gw.get("/api/usage", Some(&cookie)).await.status(), 200);
    assert_eq!(gw.get("/api/usage", Some(&cookie)).await.status(), 429);

    // Another user has their own window.
    let other = gw.sign_in(Identity::new("u2", "b@example.com"));
    assert_eq!(gw.get("/api/usage", Some(&other)).await.status(), 200);
}

#[tokio::test]
async fn test_ticket_validation_and_listing() {
    let gw = TestGateway::start().await;
    let cookie = gw.sign_in(Identity::new("u1", "a@example.com"));

    let res = gw
        .post_json("/api/support/tickets", Some(&cookie), json!({ "subject": "x", "message": "short" }))
        .await;
    assert_eq!(res.status(), 400);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert_eq!(body["error"]["details"].as_array().unwrap().len(), 2);

    let res = gw
        .post_json(
            "/api/support/tickets",
            Some(&cookie),
            json!({ "subject": "Billing question", "message": "How do I switch to annual billing?", "priority": "high" }),
        )
        .await;
    assert_eq!(res.status(), 200);
    let created: Value = res.json().await.unwrap();
    let id = created["data"]["id"].as_str().unwrap().to_string();

    let res = gw.get("/api/support/tickets", Some(&cookie)).await;
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["data"]["tickets"].as_array().unwrap().len(), 1);

    // Someone else cannot close it.
    let other = gw.sign_in(Identity::new("u2", "b@example.com"));
    let res = gw
        .post_json(&format!("/api/support/tickets/{}/close", id), Some(&other), json!({}))
        .await;
    assert_eq!(res.status(), 404);

    let res = gw
        .post_json(&format!("/api/support/tickets/{}/close", id), Some(&cookie), json!({}))
        .await;
    assert_eq!(res.status(), 200);
    let closed: Value = res.json().await.unwrap();
    assert_eq!(closed["data"]["status"], "closed");
}

#[tokio::test]
async fn test_admin_route_rejects_non_admin() {
    let gw = TestGateway::start().await;
    let user = gw.sign_in(Identity::new("u1", "ops@rekonnlabs.com"));
    let admin = gw.sign_in(Identity::new("u2", "root@example.com").with_role(Role::Admin));

    let res = gw.get("/api/admin/monitoring", Some(&user)).await;
    assert_eq!(res.status(), 403);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"]["code"], "FORBIDDEN");

    let res = gw.get("/api/admin/monitoring", Some(&admin)).await;
    assert_eq!(res.status(), 200);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["data"]["deployment"], "development");
    assert_eq!(body["data"]["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_admin_usage_reset() {
    let gw = TestGateway::start().await;
    let admin = gw.sign_in(Identity::new("u2", "root@example.com").with_role(Role::Admin));
    gw.memory.quotas.set_usage("u1", QuotaKind::ChatMessages, 100);

    let res = gw.post_json("/api/admin/usage/reset", Some(&admin), json!({})).await;
    assert_eq!(res.status(), 200);

    let user = gw.sign_in(Identity::new("u1", "a@example.com"));
    let body: Value = gw.get("/api/usage", Some(&user)).await.json().await.unwrap();
    let chat = body["data"]["usage"]
        .as_array()
        .unwrap()
        .iter()
        .find(|u| u["kind"] == "chat_messages")
        .unwrap()
        .clone();
    assert_eq!(chat["used"], 0);
}

#[tokio::test]
async fn test_sign_out_expires_cookies() {
    let gw = TestGateway::start().await;
    let cookie = gw.sign_in(Identity::new("u1", "a@example.com"));

    let res = gw.post_json("/api/auth/signout", Some(&cookie), json!({})).await;
    assert_eq!(res.status(), 200);
    let removals = res
        .headers()
        .get_all("set-cookie")
        .iter()
        .filter(|v| v.to_str().unwrap().contains("Max-Age=0"))
        .count();
    assert_eq!(removals, 3);

    assert_eq!(gw.get("/api/usage", Some(&cookie)).await.status(), 401);
}

#[tokio::test]
async fn test_sign_out_of_expiring_session_ends_it() {
    let gw = TestGateway::start().await;
    let (_, cookie) = gw.sign_in_expiring(Identity::new("u1", "a@example.com"), 10);

    let res = gw.post_json("/api/auth/signout", Some(&cookie), json!({})).await;
    assert_eq!(res.status(), 200);

    // One cookie per name, and every one of them a removal.
    let set_cookies: Vec<String> = res
        .headers()
        .get_all("set-cookie")
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect();
    assert_eq!(set_cookies.len(), 3);
    assert!(set_cookies.iter().all(|v| v.contains("Max-Age=0")));
    let last_access = set_cookies
        .iter()
        .rev()
        .find(|v| v.starts_with("sb-access-token="))
        .unwrap();
    assert!(last_access.starts_with("sb-access-token=;"));

    // The session rotated on the way in is gone too.
    assert_eq!(gw.memory.sessions.session_count(), 0);
    assert_eq!(gw.get("/api/usage", Some(&cookie)).await.status(), 401);
}

#[tokio::test]
async fn test_checkout_validates_tier() {
    let gw = TestGateway::start().await;
    let cookie = gw.sign_in(Identity::new("u1", "a@example.com"));

    let res = gw
        .post_json("/api/billing/checkout", Some(&cookie), json!({ "tier": "enterprise" }))
        .await;
    assert_eq!(res.status(), 400);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"]["details"][0]["field"], "tier");
}

#[tokio::test]
async fn test_checkout_success_through_processor() {
    let processor = start_programmable_backend(|| async {
        (200, r#"{"id":"cs_test_1","url":"https://checkout.stripe.com/c/cs_test_1"}"#.to_string())
    })
    .await;
    let gw = TestGateway::start_with(|c| {
        c.billing.api_base = format!("http://{}", processor);
        c.billing.secret_key = "sk_test".into();
        c.billing.pro_price_id = "price_pro".into();
    })
    .await;
    let cookie = gw.sign_in(Identity::new("u1", "a@example.com"));

    let res = gw.post_json("/api/billing/checkout", Some(&cookie), json!({ "tier": "pro" })).await;
    assert_eq!(res.status(), 200);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["data"]["sessionId"], "cs_test_1");
}

#[tokio::test]
async fn test_checkout_processor_failure_is_502() {
    let processor = start_programmable_backend(|| async {
        (500, r#"{"error":{"message":"internal card network failure"}}"#.to_string())
    })
    .await;
    let gw = TestGateway::start_with(|c| {
        c.billing.api_base = format!("http://{}", processor);
        c.billing.secret_key = "sk_test".into();
        c.billing.pro_byok_price_id = "price_byok".into();
    })
    .await;
    let cookie = gw.sign_in(Identity::new("u1", "a@example.com").with_tier(Tier::Pro));

    let res = gw
        .post_json("/api/billing/checkout", Some(&cookie), json!({ "tier": "pro_byok" }))
        .await;
    assert_eq!(res.status(), 502);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"]["code"], "UPSTREAM_ERROR");
    assert!(!body.to_string().contains("card network"));
}

#[tokio::test]
async fn test_oversized_body_is_413_with_security_headers() {
    let gw = TestGateway::start_with(|c| c.security.max_body_size = 16).await;
    let cookie = gw.sign_in(Identity::new("u1", "a@example.com"));

    let res = gw
        .post_json(
            "/api/billing/checkout",
            Some(&cookie),
            json!({ "tier": "pro", "note": "padding that pushes the body past the limit" }),
        )
        .await;
    assert_eq!(res.status(), 413);
    assert_eq!(res.headers()["x-frame-options"], "DENY");
    assert_eq!(res.headers()["x-content-type-options"], "nosniff");
    assert_eq!(res.headers()["x-xss-protection"], "1; mode=block");
}

#[tokio::test]
async fn test_tier_limits_are_public() {
    let gw = TestGateway::start().await;

    let res = gw.get("/api/usage/tiers", None).await;
    assert_eq!(res.status(), 200);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["data"].as_array().unwrap().len(), 3);
    assert_eq!(body["data"][0]["tier"], "free");
}
