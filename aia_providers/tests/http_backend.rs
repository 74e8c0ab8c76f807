//! Integration tests for the HTTP backend against a mock server.
//!
//! These tests verify that:
//! - Chat requests carry the expected body for each wire shape
//! - Error bodies are classified by their `detail` field
//! - Malformed success bodies and transport failures are reported, not panicked on
//! - The key endpoints hit the right paths

use std::time::Duration;

use aia_core::{
    BackendError, ChatMessage, CompletionBackend, CompletionReply, CompletionRequest,
    GENERIC_FAILURE, UNREADABLE_ERROR_BODY,
};
use aia_providers::{ChatWire, HttpBackend, HttpOptions};
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn request(api_key: Option<&str>) -> CompletionRequest {
    CompletionRequest {
        prompt: "Qual o prazo do Simples Nacional?".to_string(),
        history: vec![
            ChatMessage::user("Oi"),
            ChatMessage::assistant("Olá, em que posso ajudar?"),
        ],
        api_key: api_key.map(str::to_string),
    }
}

fn backend(server: &MockServer, wire: ChatWire) -> HttpBackend {
    HttpBackend::new(
        server.uri(),
        HttpOptions {
            timeout: Some(Duration::from_secs(5)),
            wire,
        },
    )
    .expect("Failed to build HTTP backend")
}

#[tokio::test]
async fn test_chat_posts_history_body() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_json(json!({
            "prompt": "Qual o prazo do Simples Nacional?",
            "history": [
                {"role": "user", "content": "Oi"},
                {"role": "assistant", "content": "Olá, em que posso ajudar?"}
            ],
            "api_key": "gsk_abc"
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"reply": "O prazo é o último dia útil do mês."})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let result = backend(&server, ChatWire::History)
        .complete(&request(Some("gsk_abc")))
        .await;

    assert_eq!(
        result,
        Ok(CompletionReply {
            reply: "O prazo é o último dia útil do mês.".to_string()
        })
    );
}

#[tokio::test]
async fn test_chat_omits_absent_api_key() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_json(json!({
            "prompt": "Qual o prazo do Simples Nacional?",
            "history": [
                {"role": "user", "content": "Oi"},
                {"role": "assistant", "content": "Olá, em que posso ajudar?"}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"reply": "ok"})))
        .expect(1)
        .mount(&server)
        .await;

    let result = backend(&server, ChatWire::History)
        .complete(&request(None))
        .await;

    assert!(result.is_ok(), "unexpected result: {result:?}");
}

#[tokio::test]
async fn test_session_cookie_wire_sends_message_only() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_json(json!({"message": "Qual o prazo do Simples Nacional?"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"reply": "ok"})))
        .expect(1)
        .mount(&server)
        .await;

    let result = backend(&server, ChatWire::SessionCookie)
        .complete(&request(Some("gsk_abc")))
        .await;

    assert!(result.is_ok(), "unexpected result: {result:?}");
}

#[tokio::test]
async fn test_error_detail_is_extracted() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(json!({"detail": "Chave da API Groq não encontrada."})),
        )
        .mount(&server)
        .await;

    let err = backend(&server, ChatWire::History)
        .complete(&request(None))
        .await
        .err();

    assert_eq!(
        err,
        Some(BackendError::Status {
            status: 400,
            detail: Some("Chave da API Groq não encontrada.".to_string())
        })
    );
}

#[tokio::test]
async fn test_error_without_detail_uses_generic_fallback() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(502).set_body_json(json!({})))
        .mount(&server)
        .await;

    let err = backend(&server, ChatWire::History)
        .complete(&request(None))
        .await
        .err();

    assert_eq!(
        err.map(|e| e.user_message()).as_deref(),
        Some(GENERIC_FAILURE)
    );
}

#[tokio::test]
async fn test_non_json_error_body() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
        .mount(&server)
        .await;

    let err = backend(&server, ChatWire::History)
        .complete(&request(None))
        .await
        .err();

    assert_eq!(err, Some(BackendError::UnreadableErrorBody { status: 500 }));
    assert_eq!(
        err.map(|e| e.user_message()).as_deref(),
        Some(UNREADABLE_ERROR_BODY)
    );
}

#[tokio::test]
async fn test_success_without_reply_is_malformed() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"answer": "oops"})))
        .mount(&server)
        .await;

    let err = backend(&server, ChatWire::History)
        .complete(&request(None))
        .await
        .err();

    assert!(matches!(err, Some(BackendError::Malformed(_))), "{err:?}");
    assert_eq!(
        err.map(|e| e.user_message()).as_deref(),
        Some(GENERIC_FAILURE)
    );
}

#[tokio::test]
async fn test_success_with_non_json_body_is_malformed() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
        .mount(&server)
        .await;

    let err = backend(&server, ChatWire::History)
        .complete(&request(None))
        .await
        .err();

    assert!(matches!(err, Some(BackendError::Malformed(_))), "{err:?}");
}

#[tokio::test]
async fn test_slow_backend_times_out_as_transport_failure() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"reply": "tarde demais"}))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let backend = HttpBackend::new(
        server.uri(),
        HttpOptions {
            timeout: Some(Duration::from_millis(200)),
            wire: ChatWire::History,
        },
    );
    let Ok(backend) = backend else {
        panic!("Failed to build HTTP backend");
    };

    let err = backend.complete(&request(None)).await.err();

    assert!(matches!(err, Some(BackendError::Transport(_))), "{err:?}");
}

#[tokio::test]
async fn test_unreachable_backend_is_transport_failure() {
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .and_then(|listener| listener.local_addr())
        .map(|addr| addr.port())
        .expect("Failed to reserve a local port");

    let Ok(backend) = HttpBackend::new(format!("http://127.0.0.1:{port}"), HttpOptions::default())
    else {
        panic!("Failed to build HTTP backend");
    };

    let err = backend.complete(&request(None)).await.err();

    match err {
        Some(BackendError::Transport(message)) => assert!(!message.is_empty()),
        other => panic!("expected transport failure, got {other:?}"),
    }
}

#[tokio::test]
async fn test_set_server_key() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/set-key"))
        .and(body_json(json!({"apiKey": "gsk_abc"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    let result = backend(&server, ChatWire::SessionCookie)
        .set_server_key("gsk_abc")
        .await;

    assert_eq!(result, Ok(json!({"ok": true})));
}

#[tokio::test]
async fn test_set_server_key_failure_detail() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/set-key"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"detail": "Chave inválida."})))
        .mount(&server)
        .await;

    let err = backend(&server, ChatWire::SessionCookie)
        .set_server_key("errada")
        .await
        .err();

    assert_eq!(
        err.map(|e| e.user_message_or("Erro ao salvar a chave.")).as_deref(),
        Some("Chave inválida.")
    );
}

#[tokio::test]
async fn test_clear_server_key() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/clear-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    let result = backend(&server, ChatWire::SessionCookie)
        .clear_server_key()
        .await;

    assert_eq!(result, Ok(json!({"ok": true})));
}

#[tokio::test]
async fn test_status_probe() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"message": "Asteca AIA API em execução."})),
        )
        .mount(&server)
        .await;

    let result = backend(&server, ChatWire::History).status().await;

    assert_eq!(result, Ok(json!({"message": "Asteca AIA API em execução."})));
}

#[tokio::test]
async fn test_session_cookie_wire_stores_credential_before_chat() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/set-key"))
        .and(body_json(json!({"apiKey": "gsk_abc"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/clear-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_json(json!({"message": "Qual o prazo do Simples Nacional?"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"reply": "ok"})))
        .expect(4)
        .mount(&server)
        .await;

    let backend = backend(&server, ChatWire::SessionCookie);

    assert!(backend.complete(&request(None)).await.is_ok());
    assert!(backend.complete(&request(Some("gsk_abc"))).await.is_ok());
    assert!(backend.complete(&request(Some("gsk_abc"))).await.is_ok());
    assert!(backend.complete(&request(None)).await.is_ok());

    let paths: Vec<String> = server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .map(|request| request.url.path().to_string())
        .collect();
    assert_eq!(
        paths,
        vec![
            "/api/chat",
            "/api/set-key",
            "/api/chat",
            "/api/chat",
            "/api/clear-key",
            "/api/chat",
        ]
    );
}

#[tokio::test]
async fn test_rejected_session_key_fails_the_turn() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/set-key"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"detail": "Chave inválida."})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"reply": "ok"})))
        .expect(0)
        .mount(&server)
        .await;

    let err = backend(&server, ChatWire::SessionCookie)
        .complete(&request(Some("errada")))
        .await
        .err();

    assert_eq!(
        err.map(|e| e.user_message()).as_deref(),
        Some("Chave inválida.")
    );
}

#[tokio::test]
async fn test_stalled_success_body_times_out_as_transport_failure() {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind a local port");
    let addr = listener.local_addr().expect("Failed to read local address");

    tokio::spawn(async move {
        let Ok((mut socket, _)) = listener.accept().await else {
            return;
        };
        let mut received = Vec::new();
        let mut buf = [0_u8; 1024];
        while !received.ends_with(b"}") {
            match socket.read(&mut buf).await {
                Ok(0) | Err(_) => return,
                Ok(n) => received.extend_from_slice(&buf[..n]),
            }
        }
        let head = "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: 64\r\n\r\n{\"re";
        if socket.write_all(head.as_bytes()).await.is_err() {
            return;
        }
        tokio::time::sleep(Duration::from_secs(5)).await;
    });

    let backend = HttpBackend::new(
        format!("http://{addr}"),
        HttpOptions {
            timeout: Some(Duration::from_millis(300)),
            wire: ChatWire::History,
        },
    )
    .expect("Failed to build HTTP backend");

    let err = backend.complete(&request(None)).await.err();

    assert!(matches!(err, Some(BackendError::Transport(_))), "{err:?}");
}

#[tokio::test]
async fn test_saved_server_key_survives_turns_without_override() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/set-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/clear-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"reply": "ok"})))
        .expect(2)
        .mount(&server)
        .await;

    let backend = backend(&server, ChatWire::SessionCookie);

    assert!(backend.set_server_key("gsk_salva").await.is_ok());
    assert!(backend.complete(&request(None)).await.is_ok());
    assert!(backend.complete(&request(None)).await.is_ok());
}
