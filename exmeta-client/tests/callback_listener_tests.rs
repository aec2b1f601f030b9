//! Loopback callback listener over real sockets

mod helpers;

use exmeta_client::auth::port::allocate_port;
use exmeta_client::auth::{await_callback, CallbackListener};
use helpers::send_raw_request;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

#[tokio::test]
async fn test_token_redirect_resolves_and_gets_confirmation_page() {
    let listener = CallbackListener::bind(0).await.unwrap();
    let port = listener.port();

    let browser = tokio::spawn(async move {
        send_raw_request(port, "GET /?token=abc123 HTTP/1.1\r\nHost: localhost\r\n\r\n").await
    });

    let token = listener.await_token(Duration::from_secs(5)).await;
    assert_eq!(token, "abc123");

    let page = browser.await.unwrap();
    let (head, body) = page.split_once("\r\n\r\n").unwrap();
    assert!(head.starts_with("HTTP/1.1 200 OK"));
    assert!(head.contains(&format!("Content-Length: {}", body.len())));
    assert!(body.contains("You can close this window."));
}

#[tokio::test]
async fn test_listener_is_closed_after_resolution() {
    let listener = CallbackListener::bind(0).await.unwrap();
    let port = listener.port();

    tokio::spawn(async move {
        send_raw_request(port, "GET /?token=once HTTP/1.1\r\n\r\n").await
    });
    assert_eq!(listener.await_token(Duration::from_secs(5)).await, "once");

    assert!(TcpStream::connect(("127.0.0.1", port)).await.is_err());
}

#[tokio::test]
async fn test_stalled_request_does_not_block_complete_one() {
    let listener = CallbackListener::bind(0).await.unwrap();
    let port = listener.port();

    let browser = tokio::spawn(async move {
        // Request line never terminated; the connection stays open
        let mut stalled = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        stalled.write_all(b"GET /?token=first").await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let page = send_raw_request(port, "GET /?token=second HTTP/1.1\r\n\r\n").await;
        drop(stalled);
        page
    });

    let token = listener.await_token(Duration::from_secs(5)).await;
    assert_eq!(token, "second");

    let page = browser.await.unwrap();
    assert!(page.starts_with("HTTP/1.1 200 OK"));
    assert!(page.contains("Login Successful"));
}

#[tokio::test(start_paused = true)]
async fn test_timeout_yields_empty_token() {
    let port = allocate_port(40_000).unwrap();
    let token = await_callback(port, Duration::from_secs(60)).await.unwrap();
    assert_eq!(token, "");
}

#[tokio::test]
async fn test_preconnect_does_not_resolve() {
    let listener = CallbackListener::bind(0).await.unwrap();
    let port = listener.port();

    let browser = tokio::spawn(async move {
        // Speculative connection that never sends a request
        let mut idle = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        idle.shutdown().await.unwrap();
        drop(idle);
        send_raw_request(port, "GET /?token=real HTTP/1.1\r\n\r\n").await
    });

    assert_eq!(listener.await_token(Duration::from_secs(5)).await, "real");
    assert!(browser.await.unwrap().contains("Login Successful"));
}

#[tokio::test]
async fn test_non_get_request_is_answered_with_empty_token() {
    let listener = CallbackListener::bind(0).await.unwrap();
    let port = listener.port();

    let browser = tokio::spawn(async move {
        send_raw_request(port, "POST /?token=abc HTTP/1.1\r\n\r\n").await
    });

    assert_eq!(listener.await_token(Duration::from_secs(5)).await, "");
    assert!(browser.await.unwrap().starts_with("HTTP/1.1 200 OK"));
}

#[tokio::test]
async fn test_allocated_port_is_bindable() {
    let port = allocate_port(41_000).unwrap();
    assert!(port >= 41_000);
    let listener = CallbackListener::bind(port).await.unwrap();
    assert_eq!(listener.port(), port);
}

#[tokio::test]
async fn test_bind_conflict_reports_addr_in_use() {
    let held = CallbackListener::bind(0).await.unwrap();
    let err = CallbackListener::bind(held.port()).await.unwrap_err();
    assert!(err.is_addr_in_use());
}
