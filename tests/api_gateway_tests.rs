// Gateway status-policy tests. A one-shot local server answers a single
// request with a canned response, which pins the response screening:
// auth failures resolve to None and notify the session-expiry channel,
// other failures surface as typed errors carrying the body, and neither
// path leaks a raw status to the caller.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use courier::api::{ApiError, ApiEvent};
use courier::ApiClient;

/// Bind an ephemeral port and answer the first request with the given
/// status line and body, then close the connection.
async fn one_shot_server(status_line: &str, body: &str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("local addr");
    let response = format!(
        "{}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status_line,
        body.len(),
        body
    );
    tokio::spawn(async move {
        if let Ok((mut stream, _)) = listener.accept().await {
            let mut request = [0u8; 4096];
            let _ = stream.read(&mut request).await;
            let _ = stream.write_all(response.as_bytes()).await;
            let _ = stream.shutdown().await;
        }
    });
    format!("http://{}", addr)
}

#[tokio::test]
async fn test_unauthorized_resolves_to_none_and_notifies_session_expiry() {
    let base = one_shot_server("HTTP/1.1 401 Unauthorized", "{}").await;
    let (api, mut api_rx) = ApiClient::new(&base).expect("client builds");

    // A 401 is not an error to the caller; it short-circuits to None
    // while the global handler hears about it on the event channel.
    let friends = api.friends_list().await.expect("401 must not raise");
    assert!(friends.is_none());
    assert_eq!(api_rx.try_recv().ok(), Some(ApiEvent::SessionExpired));
}

#[tokio::test]
async fn test_forbidden_is_treated_like_unauthorized() {
    let base = one_shot_server("HTTP/1.1 403 Forbidden", "{}").await;
    let (api, mut api_rx) = ApiClient::new(&base).expect("client builds");

    let history = api.message_history(1, 2).await.expect("403 must not raise");
    assert!(history.is_none());
    assert_eq!(api_rx.try_recv().ok(), Some(ApiEvent::SessionExpired));
}

#[tokio::test]
async fn test_server_error_surfaces_status_and_body() {
    let base = one_shot_server("HTTP/1.1 500 Internal Server Error", "it broke").await;
    let (api, mut api_rx) = ApiClient::new(&base).expect("client builds");

    match api.friends_list().await {
        Err(ApiError::Status { status, message }) => {
            assert_eq!(status, 500);
            assert!(message.contains("it broke"));
        }
        other => panic!("expected a status error, got {:?}", other),
    }
    assert!(
        api_rx.try_recv().is_err(),
        "a 500 must not expire the session"
    );
}
