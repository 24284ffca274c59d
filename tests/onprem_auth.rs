// On-prem login/renew/logout against a hand-rolled mock security service,
// exercising the facade end to end rather than `OnpremProvider` directly.

mod common;

use std::collections::HashMap;

use common::{MockServer, Route};
use oracle_nosql_rust_auth::Authorization;

#[tokio::test]
async fn test_login_then_reuses_token_without_relogin() {
    let mut routes = HashMap::new();
    routes.insert(
        "GET /V2/nosql/security/login".to_string(),
        Route::json(200, r#"{"token":"tok-1","expireAt":99999999999999}"#),
    );
    let server = MockServer::start(routes).await;

    let auth = Authorization::builder()
        .onprem_auth("testUser", "12345")
        .unwrap()
        .endpoint(&server.base_url())
        .unwrap()
        .build()
        .await
        .unwrap();

    let first = auth.get_authorization("GET", "/V2/nosql/data", None).await.unwrap();
    let second = auth.get_authorization("GET", "/V2/nosql/data", None).await.unwrap();
    assert_eq!(first.get("authorization").unwrap(), "Bearer tok-1");
    assert_eq!(second.get("authorization").unwrap(), "Bearer tok-1");

    // only the first call should have hit /login; the second reused the
    // still-valid token with no further request to the server.
    let seen = server.requests().await;
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].1, "/V2/nosql/security/login");
    assert!(seen[0].2.as_deref().unwrap_or("").starts_with("Basic "));

    auth.close().await;
    server.stop();
}

#[tokio::test]
async fn test_invalidate_forces_relogin() {
    let mut routes = HashMap::new();
    routes.insert(
        "GET /V2/nosql/security/login".to_string(),
        Route::json(200, r#"{"token":"tok-1","expireAt":99999999999999}"#),
    );
    let server = MockServer::start(routes).await;

    let auth = Authorization::builder()
        .onprem_auth("testUser", "12345")
        .unwrap()
        .endpoint(&server.base_url())
        .unwrap()
        .build()
        .await
        .unwrap();

    auth.get_authorization("GET", "/V2/nosql/data", None).await.unwrap();
    auth.invalidate().await;

    let seen = server.requests().await;
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[1].1, "/V2/nosql/security/login");

    auth.close().await;
    server.stop();
}

#[tokio::test]
async fn test_close_logs_out() {
    let mut routes = HashMap::new();
    routes.insert(
        "GET /V2/nosql/security/login".to_string(),
        Route::json(200, r#"{"token":"tok-1","expireAt":99999999999999}"#),
    );
    routes.insert("GET /V2/nosql/security/logout".to_string(), Route::json(200, "{}"));
    let server = MockServer::start(routes).await;

    let auth = Authorization::builder()
        .onprem_auth("testUser", "12345")
        .unwrap()
        .endpoint(&server.base_url())
        .unwrap()
        .build()
        .await
        .unwrap();

    auth.get_authorization("GET", "/V2/nosql/data", None).await.unwrap();
    auth.close().await;

    let seen = server.requests().await;
    assert_eq!(seen.last().unwrap().1, "/V2/nosql/security/logout");
    assert_eq!(seen.last().unwrap().2.as_deref(), Some("Bearer tok-1"));

    server.stop();
}

#[tokio::test]
async fn test_credentials_from_json_file() {
    let mut routes = HashMap::new();
    routes.insert(
        "GET /V2/nosql/security/login".to_string(),
        Route::json(200, r#"{"token":"tok-file","expireAt":99999999999999}"#),
    );
    let server = MockServer::start(routes).await;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("creds.json");
    std::fs::write(&path, r#"{"user":"alice","password":"s3cret"}"#).unwrap();

    let auth = Authorization::builder()
        .onprem_auth_from_file(path.to_str().unwrap())
        .unwrap()
        .endpoint(&server.base_url())
        .unwrap()
        .build()
        .await
        .unwrap();

    let headers = auth.get_authorization("GET", "/V2/nosql/data", None).await.unwrap();
    assert_eq!(headers.get("authorization").unwrap(), "Bearer tok-file");

    auth.close().await;
    server.stop();
}

#[tokio::test]
async fn test_login_failure_surfaces_as_error() {
    let mut routes = HashMap::new();
    routes.insert("GET /V2/nosql/security/login".to_string(), Route::json(401, r#"{"error":"bad credentials"}"#));
    let server = MockServer::start(routes).await;

    let auth = Authorization::builder()
        .onprem_auth("testUser", "wrong")
        .unwrap()
        .endpoint(&server.base_url())
        .unwrap()
        .build()
        .await
        .unwrap();

    let err = auth.get_authorization("GET", "/V2/nosql/data", None).await.unwrap_err();
    assert!(matches!(err.code, oracle_nosql_rust_auth::NoSQLErrorCode::IllegalArgument));

    auth.close().await;
    server.stop();
}
