use axum::http::{self, Request, StatusCode};
use http_body_util::BodyExt;
use mock_server::{app, Echo, UploadedPart, EDN_DOCUMENT};
use tower::ServiceExt;

async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

fn empty_request(method: &str, uri: &str) -> Request<String> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(String::new())
        .unwrap()
}

// --- echo ---

#[tokio::test]
async fn echo_reflects_the_request() {
    let resp = app()
        .oneshot(
            Request::builder()
                .method("PATCH")
                .uri("/echo?a=1&b=two")
                .header("x-api-key", "k")
                .header(http::header::CONTENT_TYPE, "text/plain")
                .body("hello".to_string())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let echo: Echo = body_json(resp).await;
    assert_eq!(echo.method, "PATCH");
    assert_eq!(echo.path, "/echo");
    assert_eq!(echo.query.as_deref(), Some("a=1&b=two"));
    assert_eq!(echo.headers["x-api-key"], "k");
    assert_eq!(echo.headers["content-type"], "text/plain");
    assert_eq!(echo.body, "hello");
}

#[tokio::test]
async fn echo_accepts_any_method() {
    for method in ["GET", "POST", "PUT", "DELETE"] {
        let resp = app().oneshot(empty_request(method, "/echo")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK, "{method}");
        let echo: Echo = body_json(resp).await;
        assert_eq!(echo.method, method);
        assert!(echo.query.is_none());
    }
}

// --- upload ---

#[tokio::test]
async fn upload_reflects_each_part() {
    let body = "--B\r\n\
        Content-Disposition: form-data; name=\"field\"\r\n\r\n\
        value\r\n\
        --B\r\n\
        Content-Disposition: form-data; name=\"file\"; filename=\"a.txt\"\r\n\
        Content-Type: text/plain\r\n\r\n\
        contents\r\n\
        --B--";
    let resp = app()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/upload")
                .header(http::header::CONTENT_TYPE, "multipart/form-data; boundary=B")
                .body(body.to_string())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let parts: Vec<UploadedPart> = body_json(resp).await;
    assert_eq!(parts.len(), 2);
    assert_eq!(parts[0].name.as_deref(), Some("field"));
    assert!(parts[0].file_name.is_none());
    assert_eq!(parts[0].text, "value");
    assert_eq!(parts[1].file_name.as_deref(), Some("a.txt"));
    assert_eq!(parts[1].content_type.as_deref(), Some("text/plain"));
    assert_eq!(parts[1].text, "contents");
}

#[tokio::test]
async fn upload_without_multipart_content_type_is_rejected() {
    let resp = app()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/upload")
                .header(http::header::CONTENT_TYPE, "application/json")
                .body("{}".to_string())
                .unwrap(),
        )
        .await
        .unwrap();

    assert!(resp.status().is_client_error());
}

// --- status ---

#[tokio::test]
async fn status_replies_with_requested_code() {
    let resp = app().oneshot(empty_request("GET", "/status/418")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::IM_A_TEAPOT);
    assert_eq!(body_bytes(resp).await, "status 418");
}

#[tokio::test]
async fn status_rejects_out_of_range_code() {
    let resp = app().oneshot(empty_request("GET", "/status/42")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

// --- edn / json / slow ---

#[tokio::test]
async fn edn_is_served_with_its_content_type() {
    let resp = app().oneshot(empty_request("GET", "/edn")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers()[http::header::CONTENT_TYPE],
        "application/edn"
    );
    assert_eq!(body_bytes(resp).await, EDN_DOCUMENT);
}

#[tokio::test]
async fn json_echoes_the_document() {
    let resp = app()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/json")
                .header(http::header::CONTENT_TYPE, "application/json")
                .body(r#"{"b":1,"a":[true,null]}"#.to_string())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let value: serde_json::Value = body_json(resp).await;
    assert_eq!(value, serde_json::json!({"b": 1, "a": [true, null]}));
}

#[tokio::test]
async fn json_rejects_malformed_documents() {
    let resp = app()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/json")
                .header(http::header::CONTENT_TYPE, "application/json")
                .body("{nope".to_string())
                .unwrap(),
        )
        .await
        .unwrap();

    assert!(resp.status().is_client_error());
}

#[tokio::test]
async fn slow_replies_after_the_delay() {
    let started = std::time::Instant::now();
    let resp = app().oneshot(empty_request("GET", "/slow/20")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(started.elapsed() >= std::time::Duration::from_millis(20));
    assert_eq!(body_bytes(resp).await, "done");
}
