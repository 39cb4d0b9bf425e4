use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use serde_json::Value;

pub const API_KEY: &str = "sk-stub";

pub const OUTLINE_JSON: &str = r#"```json
{
  "title": "Deep Work",
  "introduction": "Why depth matters.",
  "chapters": [
    {"number": 1, "title": "The Case for Depth", "description": "Argues for depth."},
    {"number": 2, "title": "Rules of Focus", "description": "Four rules."},
    {"number": 3, "title": "Quit Social Media", "description": "Less noise."}
  ],
  "conclusion": "Go deep."
}
```"#;

pub const CHAPTER_TEXT: &str = "# Opening\n\nStub chapter body.\n\n## Detail\n\nMore text.";

#[derive(Debug, Clone)]
pub struct ProviderStubConfig {
    /// Text returned for outline prompts.
    pub outline_response: String,
}

impl Default for ProviderStubConfig {
    fn default() -> Self {
        Self {
            outline_response: OUTLINE_JSON.to_owned(),
        }
    }
}

/// Speaks just enough of the OpenAI chat-completions and Anthropic messages
/// protocols to drive the binary end to end.
pub struct ProviderStub {
    pub openai_base_url: String,
    pub anthropic_base_url: String,
    shutdown_tx: Option<mpsc::Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl ProviderStub {
    pub fn spawn(config: ProviderStubConfig) -> Self {
        let server = tiny_http::Server::http("127.0.0.1:0").expect("start provider stub server");
        let addr = server.server_addr();
        let base_url = format!("http://{addr}/v1");

        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let handle = thread::spawn(move || {
            loop {
                if shutdown_rx.try_recv().is_ok() {
                    break;
                }

                let mut request = match server.recv_timeout(Duration::from_millis(50)) {
                    Ok(Some(req)) => req,
                    Ok(None) => continue,
                    Err(_) => break,
                };

                let path = request.url().to_string();
                let anthropic = match path.as_str() {
                    "/v1/chat/completions" => false,
                    "/v1/messages" => true,
                    _ => {
                        let _ = request.respond(
                            tiny_http::Response::from_string("not found").with_status_code(404),
                        );
                        continue;
                    }
                };

                let authorized = if anthropic {
                    header(&request, "x-api-key").as_deref() == Some(API_KEY)
                        && header(&request, "anthropic-version").as_deref() == Some("2023-06-01")
                } else {
                    header(&request, "authorization") == Some(format!("Bearer {API_KEY}"))
                };
                if !authorized {
                    let _ = request.respond(
                        tiny_http::Response::from_string(
                            r#"{"error": {"message": "invalid api key"}}"#,
                        )
                        .with_status_code(401),
                    );
                    continue;
                }

                let mut body = String::new();
                if request.as_reader().read_to_string(&mut body).is_err() {
                    let _ = request.respond(
                        tiny_http::Response::from_string("invalid request body")
                            .with_status_code(400),
                    );
                    continue;
                }
                let parsed: Value = match serde_json::from_str(&body) {
                    Ok(value) => value,
                    Err(_) => {
                        let _ = request.respond(
                            tiny_http::Response::from_string("invalid json").with_status_code(400),
                        );
                        continue;
                    }
                };
                let Some(prompt) = parsed
                    .pointer("/messages/0/content")
                    .and_then(|v| v.as_str())
                else {
                    let _ = request.respond(
                        tiny_http::Response::from_string("missing messages").with_status_code(400),
                    );
                    continue;
                };

                let output_text = if prompt.contains("CHAPTER TO WRITE:") {
                    CHAPTER_TEXT.to_owned()
                } else if prompt.contains("BEGIN_CHAPTER_TEXT") {
                    "Revised stub text.".to_owned()
                } else if prompt.contains("engaging description") {
                    "Stub description.".to_owned()
                } else if prompt.contains("6-10 logically organized chapters") {
                    config.outline_response.clone()
                } else {
                    let _ = request.respond(
                        tiny_http::Response::from_string("unknown prompt mode")
                            .with_status_code(400),
                    );
                    continue;
                };

                let response_body = if anthropic {
                    serde_json::json!({
                        "id": "msg_stub",
                        "type": "message",
                        "role": "assistant",
                        "content": [{ "type": "text", "text": output_text }],
                    })
                } else {
                    serde_json::json!({
                        "id": "chatcmpl_stub",
                        "object": "chat.completion",
                        "choices": [{
                            "index": 0,
                            "message": { "role": "assistant", "content": output_text },
                            "finish_reason": "stop",
                        }],
                    })
                };

                let mut response = tiny_http::Response::from_string(response_body.to_string())
                    .with_status_code(200);
                let header =
                    tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..])
                        .expect("build header");
                response = response.with_header(header);
                let _ = request.respond(response);
            }
        });

        Self {
            openai_base_url: base_url.clone(),
            anthropic_base_url: base_url,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }
}

impl Drop for ProviderStub {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn header(request: &tiny_http::Request, name: &'static str) -> Option<String> {
    request
        .headers()
        .iter()
        .find(|h| h.field.equiv(name))
        .map(|h| h.value.as_str().to_owned())
}
