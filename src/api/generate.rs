use std::error::Error as StdError;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

use crate::api::{GenerateRequest, GenerateResponse, GENERATE_PATH};
use crate::utils::url::construct_api_url;

const MAX_ERROR_SUMMARY_CHARS: usize = 200;

/// Anything that can turn a prompt into reply text.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;
}

/// What went wrong while talking to the generation endpoint. Callers treat
/// every kind the same way; the kind is kept for logs and notices.
#[derive(Debug)]
pub enum GenerationErrorKind {
    /// The endpoint answered with a non-success status.
    Status { status: u16, summary: String },
    /// The request never completed (refused, reset, timed out).
    Transport(reqwest::Error),
    /// The body was not a JSON object with a `response` string.
    Decode(serde_json::Error),
}

#[derive(Debug)]
pub struct GenerationError {
    kind: GenerationErrorKind,
}

impl GenerationError {
    pub fn status(status: u16, body: &str) -> Self {
        Self {
            kind: GenerationErrorKind::Status {
                status,
                summary: summarize_error_body(body),
            },
        }
    }

    pub fn transport(source: reqwest::Error) -> Self {
        Self {
            kind: GenerationErrorKind::Transport(source),
        }
    }

    pub fn decode(source: serde_json::Error) -> Self {
        Self {
            kind: GenerationErrorKind::Decode(source),
        }
    }

    pub fn kind(&self) -> &GenerationErrorKind {
        &self.kind
    }

    pub fn is_timeout(&self) -> bool {
        matches!(&self.kind, GenerationErrorKind::Transport(err) if err.is_timeout())
    }
}

impl fmt::Display for GenerationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            GenerationErrorKind::Status { status, summary } if summary.is_empty() => {
                write!(f, "generation request failed with status {status}")
            }
            GenerationErrorKind::Status { status, summary } => {
                write!(f, "generation request failed with status {status}: {summary}")
            }
            GenerationErrorKind::Transport(err) => {
                write!(f, "could not reach generation service: {err}")
            }
            GenerationErrorKind::Decode(err) => {
                write!(f, "malformed generation response: {err}")
            }
        }
    }
}

impl StdError for GenerationError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match &self.kind {
            GenerationErrorKind::Status { .. } => None,
            GenerationErrorKind::Transport(err) => Some(err),
            GenerationErrorKind::Decode(err) => Some(err),
        }
    }
}

/// Generator backed by a single HTTP `POST {base_url}/generate` per call.
/// No retries; the first failure is returned.
#[derive(Clone)]
pub struct HttpGenerator {
    client: reqwest::Client,
    endpoint: String,
    model: Option<String>,
}

impl HttpGenerator {
    pub fn new(
        base_url: &str,
        model: Option<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, base_url, model))
    }

    pub fn with_client(client: reqwest::Client, base_url: &str, model: Option<String>) -> Self {
        Self {
            client,
            endpoint: construct_api_url(base_url, GENERATE_PATH),
            model,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn request(&self, prompt: &str) -> Result<String, GenerationError> {
        let request = GenerateRequest::new(prompt, self.model.clone());

        let response = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(GenerationError::transport)?;

        let status = response.status();
        let body = response.text().await.map_err(GenerationError::transport)?;

        if !status.is_success() {
            return Err(GenerationError::status(status.as_u16(), &body));
        }

        let parsed: GenerateResponse =
            serde_json::from_str(&body).map_err(GenerationError::decode)?;
        Ok(parsed.response)
    }
}

#[async_trait]
impl Generator for HttpGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        match self.request(prompt).await {
            Ok(reply) => {
                tracing::debug!(endpoint = %self.endpoint, chars = reply.len(), "generation succeeded");
                Ok(reply)
            }
            Err(err) => {
                tracing::warn!(endpoint = %self.endpoint, error = %err, "generation failed");
                Err(err)
            }
        }
    }
}

fn extract_error_summary(value: &serde_json::Value) -> Option<String> {
    value
        .pointer("/error/message")
        .and_then(|v| v.as_str())
        .map(str::to_owned)
        .or_else(|| {
            value
                .get("error")
                .and_then(|v| v.as_str().map(str::to_owned))
        })
        .or_else(|| {
            value
                .get("message")
                .and_then(|v| v.as_str().map(str::to_owned))
        })
}

/// One-line description of an error body for logs and notices.
fn summarize_error_body(body: &str) -> String {
    let trimmed = body.trim();
    let summary = serde_json::from_str::<serde_json::Value>(trimmed)
        .ok()
        .and_then(|value| extract_error_summary(&value))
        .unwrap_or_else(|| trimmed.to_string());

    let collapsed = summary.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() > MAX_ERROR_SUMMARY_CHARS {
        let mut cut: String = collapsed.chars().take(MAX_ERROR_SUMMARY_CHARS).collect();
        cut.push('…');
        cut
    } else {
        collapsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::task::JoinHandle;

    async fn read_http_request(stream: &mut TcpStream) -> Result<(String, Vec<u8>), String> {
        let mut buffer = Vec::new();
        let mut chunk = [0u8; 1024];
        let header_end = loop {
            let read = stream.read(&mut chunk).await.map_err(|e| e.to_string())?;
            if read == 0 {
                return Err("Unexpected EOF while reading HTTP headers".to_string());
            }
            buffer.extend_from_slice(&chunk[..read]);
            if let Some(pos) = buffer.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
        };

        let head = String::from_utf8_lossy(&buffer[..header_end]).to_string();
        let content_length = head
            .lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
            .and_then(|(_, value)| value.trim().parse::<usize>().ok())
            .unwrap_or(0);

        let mut body = buffer[header_end..].to_vec();
        while body.len() < content_length {
            let read = stream.read(&mut chunk).await.map_err(|e| e.to_string())?;
            if read == 0 {
                return Err("Unexpected EOF while reading HTTP body".to_string());
            }
            body.extend_from_slice(&chunk[..read]);
        }
        body.truncate(content_length);

        let request_line = head.lines().next().unwrap_or_default().to_string();
        Ok((request_line, body))
    }

    /// Serve exactly one request with a canned response; resolves to the
    /// request line and JSON body the client sent.
    async fn serve_once(
        status_line: &'static str,
        body: &'static str,
    ) -> (String, JoinHandle<Result<(String, serde_json::Value), String>>) {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("listener should bind");
        let addr = listener.local_addr().expect("local addr should resolve");

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.map_err(|e| e.to_string())?;
            let (request_line, raw_body) = read_http_request(&mut stream).await?;
            let json: serde_json::Value =
                serde_json::from_slice(&raw_body).map_err(|e| e.to_string())?;
            let response = format!(
                "HTTP/1.1 {status_line}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            stream
                .write_all(response.as_bytes())
                .await
                .map_err(|e| e.to_string())?;
            Ok((request_line, json))
        });

        (format!("http://{addr}/api/"), server)
    }

    fn generator(base_url: &str, model: Option<&str>) -> HttpGenerator {
        HttpGenerator::new(base_url, model.map(str::to_string), Duration::from_secs(5))
            .expect("client builds")
    }

    #[test]
    fn endpoint_joins_base_and_path() {
        let client = generator("http://localhost:11434/api/", None);
        assert_eq!(client.endpoint(), "http://localhost:11434/api/generate");
    }

    #[tokio::test]
    async fn successful_reply_returns_response_field() {
        let (base_url, server) = serve_once("200 OK", r#"{"response":"Hello there"}"#).await;
        let reply = generator(&base_url, Some("llama3"))
            .generate("Hi")
            .await
            .expect("generation succeeds");
        assert_eq!(reply, "Hello there");

        let (request_line, body) = server.await.unwrap().unwrap();
        assert_eq!(request_line, "POST /api/generate HTTP/1.1");
        assert_eq!(
            body,
            serde_json::json!({"prompt": "Hi", "model": "llama3", "stream": false})
        );
    }

    #[tokio::test]
    async fn non_success_status_is_a_status_error() {
        let (base_url, server) = serve_once(
            "503 Service Unavailable",
            r#"{"error":{"message":"model overloaded"}}"#,
        )
        .await;
        let err = generator(&base_url, None).generate("Hi").await.unwrap_err();
        match err.kind() {
            GenerationErrorKind::Status { status, summary } => {
                assert_eq!(*status, 503);
                assert_eq!(summary, "model overloaded");
            }
            other => panic!("expected status error, got {other:?}"),
        }
        assert!(err.to_string().contains("503"));
        server.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn body_without_response_field_is_a_decode_error() {
        let (base_url, server) = serve_once("200 OK", r#"{"answer":"nope"}"#).await;
        let err = generator(&base_url, None).generate("Hi").await.unwrap_err();
        assert!(matches!(err.kind(), GenerationErrorKind::Decode(_)));
        assert!(err.source().is_some());
        server.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn unparseable_body_is_a_decode_error() {
        let (base_url, server) = serve_once("200 OK", "<html>oops</html>").await;
        let err = generator(&base_url, None).generate("Hi").await.unwrap_err();
        assert!(matches!(err.kind(), GenerationErrorKind::Decode(_)));
        server.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn refused_connection_is_a_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = generator(&format!("http://{addr}"), None)
            .generate("Hi")
            .await
            .unwrap_err();
        assert!(matches!(err.kind(), GenerationErrorKind::Transport(_)));
    }

    #[tokio::test]
    async fn stalled_server_times_out_as_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(2)).await;
            drop(stream);
        });

        let client =
            HttpGenerator::new(&format!("http://{addr}"), None, Duration::from_millis(100))
                .unwrap();
        let err = client.generate("Hi").await.unwrap_err();
        assert!(err.is_timeout());
        server.abort();
    }

    #[test]
    fn summaries_prefer_structured_messages() {
        assert_eq!(
            summarize_error_body(r#"{"error":"bad   model"}"#),
            "bad model"
        );
        assert_eq!(summarize_error_body(r#"{"message":"nope"}"#), "nope");
        assert_eq!(summarize_error_body("  plain\n failure "), "plain failure");
        assert_eq!(summarize_error_body(""), "");
    }

    #[test]
    fn long_summaries_are_truncated() {
        let long = "x".repeat(MAX_ERROR_SUMMARY_CHARS + 50);
        let summary = summarize_error_body(&long);
        assert_eq!(summary.chars().count(), MAX_ERROR_SUMMARY_CHARS + 1);
        assert!(summary.ends_with('…'));
    }
}
