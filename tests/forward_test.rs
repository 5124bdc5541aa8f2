//! End-to-end tests for plain HTTP forwarding.

mod common;

use common::*;
use forward_proxy::config::ProxyConfig;
use reqwest::StatusCode;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

#[tokio::test]
async fn relays_status_headers_and_body() {
    let (origin, mut seen) = start_origin(|_| {
        http_response("201 Created", &[("X-Test", "a"), ("X-Test", "b")], b"ok")
    })
    .await;
    let proxy = start_proxy(ProxyConfig::default()).await;

    let response = proxied_client(proxy.addr)
        .get(format!("http://{}/path?q=1", origin))
        .header("X-Test", "a")
        .header("X-Test", "b")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let values: Vec<_> = response
        .headers()
        .get_all("x-test")
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect();
    assert_eq!(values, ["a", "b"]);
    assert_eq!(response.text().await.unwrap(), "ok");

    let request = seen.recv().await.unwrap();
    assert_eq!(request.request_line(), "GET /path?q=1 HTTP/1.1");
    assert_eq!(request.header_values("x-test"), ["a", "b"]);
}

#[tokio::test]
async fn request_bodies_reach_origin_intact() {
    let (origin, mut seen) =
        start_origin(|request| http_response("200 OK", &[], &request.body)).await;
    let proxy = start_proxy(ProxyConfig::default()).await;
    let client = proxied_client(proxy.addr);

    let empty = client
        .post(format!("http://{}/empty", origin))
        .body(Vec::new())
        .send()
        .await
        .unwrap();
    assert_eq!(empty.status(), StatusCode::OK);
    assert!(empty.bytes().await.unwrap().is_empty());
    assert!(seen.recv().await.unwrap().body.is_empty());

    let payload = random_bytes(1024 * 1024, 1);
    let large = client
        .post(format!("http://{}/upload", origin))
        .body(payload.clone())
        .send()
        .await
        .unwrap();
    assert_eq!(large.status(), StatusCode::OK);
    assert_eq!(large.bytes().await.unwrap().as_ref(), payload.as_slice());

    let request = seen.recv().await.unwrap();
    assert_eq!(request.request_line(), "POST /upload HTTP/1.1");
    assert_eq!(request.body, payload);
}

#[tokio::test]
async fn default_config_relays_every_response_header() {
    let (origin, _seen) = start_origin(|_| {
        http_response("200 OK", &[("Connection", "x-foo"), ("X-Foo", "1")], b"ok")
    })
    .await;
    let proxy = start_proxy(ProxyConfig::default()).await;

    let response = proxied_client(proxy.addr)
        .get(format!("http://{}/", origin))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("x-foo").unwrap(), "1");
    assert_eq!(response.text().await.unwrap(), "ok");
}

#[tokio::test]
async fn origin_error_statuses_pass_through() {
    let (origin, _seen) =
        start_origin(|_| http_response("404 Not Found", &[], b"missing")).await;
    let proxy = start_proxy(ProxyConfig::default()).await;

    let response = proxied_client(proxy.addr)
        .get(format!("http://{}/nope", origin))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(response.text().await.unwrap(), "missing");
}

#[tokio::test]
async fn unreachable_origin_is_500_with_error_text() {
    let dead = closed_port().await;
    let proxy = start_proxy(ProxyConfig::default()).await;

    let response = proxied_client(proxy.addr)
        .get(format!("http://{}/", dead))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = response.text().await.unwrap();
    assert!(body.starts_with("Error sending request"), "{body}");
}

#[tokio::test]
async fn origin_form_request_is_rejected() {
    let proxy = start_proxy(ProxyConfig::default()).await;

    let mut stream = TcpStream::connect(proxy.addr).await.unwrap();
    stream
        .write_all(b"GET /local HTTP/1.1\r\nHost: proxy.test\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();
    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await.unwrap();
    let raw = String::from_utf8_lossy(&raw);

    assert!(raw.starts_with("HTTP/1.1 500"), "{raw}");
    assert!(raw.contains("Error creating new request"), "{raw}");
}

#[tokio::test]
async fn hop_by_hop_headers_are_stripped_when_configured() {
    let (origin, mut seen) = start_origin(|_| {
        http_response("200 OK", &[("Keep-Alive", "timeout=5"), ("X-Origin", "1")], b"")
    })
    .await;
    let mut config = ProxyConfig::default();
    config.headers.strip_hop_by_hop = true;
    let proxy = start_proxy(config).await;

    let mut stream = TcpStream::connect(proxy.addr).await.unwrap();
    let request = format!(
        "GET http://{origin}/hop HTTP/1.1\r\n\
         Host: {origin}\r\n\
         Connection: close, X-Drop\r\n\
         X-Drop: 1\r\n\
         Proxy-Authorization: Basic Zm9vOmJhcg==\r\n\
         X-Keep: 1\r\n\r\n"
    );
    stream.write_all(request.as_bytes()).await.unwrap();
    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await.unwrap();
    let raw = String::from_utf8_lossy(&raw).to_ascii_lowercase();

    assert!(raw.starts_with("http/1.1 200"), "{raw}");
    assert!(raw.contains("x-origin: 1"), "{raw}");
    assert!(!raw.contains("keep-alive: timeout"), "{raw}");

    let forwarded = seen.recv().await.unwrap();
    assert_eq!(forwarded.header_values("x-keep"), ["1"]);
    assert!(forwarded.header_values("x-drop").is_empty());
    assert!(forwarded.header_values("proxy-authorization").is_empty());
}

#[tokio::test]
async fn excluded_headers_are_dropped_and_stripping_can_be_disabled() {
    let (origin, mut seen) = start_origin(|_| http_response("200 OK", &[], b"")).await;
    let mut config = ProxyConfig::default();
    config.headers.strip_hop_by_hop = false;
    config.headers.excluded = vec!["x-secret".into()];
    let proxy = start_proxy(config).await;

    proxied_client(proxy.addr)
        .get(format!("http://{}/", origin))
        .header("X-Secret", "hunter2")
        .header("Proxy-Authorization", "Basic Zm9vOmJhcg==")
        .send()
        .await
        .unwrap();

    let forwarded = seen.recv().await.unwrap();
    assert!(forwarded.header_values("x-secret").is_empty());
    assert_eq!(
        forwarded.header_values("proxy-authorization"),
        ["Basic Zm9vOmJhcg=="]
    );
}
