//! Integration tests for middleware functionality.
#![cfg(feature = "hyper-transport")]

use std::sync::Arc;

use ferrule::compose::from_fn;
use ferrule::header::{AUTHORIZATION, HeaderValue};
use ferrule::{Client, HyperTransport, Middleware, Registry, RequestOptions, Response, UseOptions};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{header, method, path},
};

fn builder(server: &MockServer) -> ferrule::ClientBuilder {
    Client::builder()
        .registry(Arc::new(Registry::new()))
        .base_url(server.uri())
        .adapter(HyperTransport::new())
}

fn bearer_auth(token: &'static str) -> impl Middleware {
    from_fn(move |ctx, next| {
        Box::pin(async move {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| ferrule::Error::configuration(e.to_string()))?;
            ctx.config_mut().headers.insert(AUTHORIZATION, value);
            next.run(ctx).await
        })
    })
    .named("bearer_auth")
}

/// Test that a middleware editing the configuration reaches the wire.
#[tokio::test]
async fn test_bearer_auth_header() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/protected"))
        .and(header("Authorization", "Bearer my-secret-token"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"user": "alice"})),
        )
        .mount(&mock_server)
        .await;

    let client = builder(&mock_server)
        .middleware(bearer_auth("my-secret-token"))
        .build();

    let response = client
        .get("/protected", RequestOptions::new())
        .await
        .expect("response");

    assert!(response.is_success());
    assert_eq!(response.data(), Some(&serde_json::json!({"user": "alice"})));
}

/// Test that logging middleware doesn't break request/response flow.
#[tokio::test]
async fn test_logging_middleware() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/logged"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"logged": true})))
        .mount(&mock_server)
        .await;

    let client = builder(&mock_server).with_logging().build();

    let response = client
        .get("/logged", RequestOptions::new())
        .await
        .expect("response");

    assert!(response.is_success());
}

/// Test debug logging on a failing call.
#[tokio::test]
async fn test_debug_logging() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let client = builder(&mock_server).with_debug_logging().build();

    let err = client
        .get("/broken", RequestOptions::new())
        .await
        .expect_err("server error");

    assert_eq!(err.status(), Some(500));
}

/// Test a core middleware short-circuiting before the network.
#[tokio::test]
async fn test_core_middleware_short_circuit() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let client = builder(&mock_server).build();
    client
        .use_middleware(
            from_fn(|ctx, _next| {
                Box::pin(async move {
                    ctx.res = Some(Response::new(
                        200,
                        ferrule::HeaderMap::new(),
                        r#"{"offline":true}"#,
                    ));
                    Ok(())
                })
            })
            .named("offline"),
            UseOptions::core(),
        )
        .expect("register");

    let response = client
        .get("/anything", RequestOptions::new())
        .await
        .expect("response");

    assert_eq!(response.data(), Some(&serde_json::json!({"offline": true})));
}

/// Test middleware composed together.
#[tokio::test]
async fn test_middleware_composition() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/composed"))
        .and(header("Authorization", "Bearer token"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&mock_server)
        .await;

    let client = builder(&mock_server)
        .with_logging()
        .middleware(bearer_auth("token"))
        .build();

    let response = client
        .get(
            "/composed",
            RequestOptions::new().response_type(ferrule::ResponseType::Text),
        )
        .await
        .expect("response");

    assert_eq!(response.text().expect("text"), "ok");
    assert_eq!(
        client.middlewares().names(),
        vec!["logging", "bearer_auth", "parse_response", "dispatch"]
    );
}
