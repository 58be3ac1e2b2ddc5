//! LLM gateway over OpenAI-compatible chat completions
//!
//! DeepSeek and Zhipu expose the OpenAI `/chat/completions` API directly;
//! Azure OpenAI uses the same body behind a deployment-scoped URL and an
//! `api-key` header. One request per call, no retries.
//!
//! Author: hephaex@gmail.com

use std::time::Duration;

use async_trait::async_trait;
use kgen_core::{GatewayError, LlmConfig, LlmGateway, PromptPayload, Supplier};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

/// Longest slice of an error body kept in `GatewayError::Http`
const MAX_ERROR_BODY: usize = 512;

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    messages: Vec<Message<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// How the API key is presented
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Auth {
    /// `Authorization: Bearer <key>`
    Bearer,
    /// `api-key: <key>`
    ApiKeyHeader,
}

/// Resolved target for one supplier
#[derive(Debug, Clone, PartialEq, Eq)]
struct Endpoint {
    url: String,
    model: Option<String>,
    auth: Auth,
}

// ============================================================================
// Gateway
// ============================================================================

/// Chat-completions gateway for every supported supplier
pub struct ChatCompletionsGateway {
    client: Client,
    config: LlmConfig,
}

impl ChatCompletionsGateway {
    /// Create from config; the HTTP client carries the request timeout
    pub fn new(config: LlmConfig) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GatewayError::Transport(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    fn endpoint(&self, supplier: Supplier) -> Result<Endpoint, GatewayError> {
        let openai_compatible = |base_url: &str, model: &str| Endpoint {
            url: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            model: Some(model.to_string()),
            auth: Auth::Bearer,
        };

        match supplier {
            Supplier::DeepSeek => Ok(openai_compatible(
                &self.config.deepseek_base_url,
                &self.config.deepseek_model,
            )),
            Supplier::Zhipu => Ok(openai_compatible(
                &self.config.zhipu_base_url,
                &self.config.zhipu_model,
            )),
            Supplier::Azure => {
                let endpoint = self.config.azure_endpoint.as_deref().ok_or_else(|| {
                    GatewayError::Misconfigured("Azure OpenAI endpoint not set".to_string())
                })?;
                let deployment = self.config.azure_deployment.as_deref().ok_or_else(|| {
                    GatewayError::Misconfigured("Azure OpenAI deployment not set".to_string())
                })?;
                Ok(Endpoint {
                    url: format!(
                        "{}/openai/deployments/{}/chat/completions?api-version={}",
                        endpoint.trim_end_matches('/'),
                        deployment,
                        self.config.azure_api_version
                    ),
                    model: None,
                    auth: Auth::ApiKeyHeader,
                })
            }
        }
    }

    fn transport_error(&self, e: reqwest::Error) -> GatewayError {
        if e.is_timeout() {
            GatewayError::Timeout {
                secs: self.config.timeout_secs,
            }
        } else {
            GatewayError::Transport(e.to_string())
        }
    }
}

#[async_trait]
impl LlmGateway for ChatCompletionsGateway {
    async fn call(
        &self,
        prompt: &PromptPayload,
        supplier: Supplier,
        api_key: &str,
        temperature: f32,
    ) -> Result<String, GatewayError> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(GatewayError::MissingApiKey(supplier));
        }

        let endpoint = self.endpoint(supplier)?;
        let request = ChatRequest {
            model: endpoint.model.as_deref(),
            messages: vec![
                Message {
                    role: "system",
                    content: &prompt.system,
                },
                Message {
                    role: "user",
                    content: &prompt.user,
                },
            ],
            max_tokens: self.config.max_tokens,
            temperature,
        };

        tracing::debug!(%supplier, url = %endpoint.url, "sending chat completion request");

        let builder = self.client.post(&endpoint.url).json(&request);
        let builder = match endpoint.auth {
            Auth::Bearer => builder.bearer_auth(api_key),
            Auth::ApiKeyHeader => builder.header("api-key", api_key),
        };

        let response = builder.send().await.map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(supplier, status, &body));
        }

        let body = response.text().await.map_err(|e| self.transport_error(e))?;
        extract_content(&body)
    }

    fn name(&self) -> &str {
        "chat-completions"
    }
}

/// Map a non-success HTTP status to a gateway error
fn status_error(supplier: Supplier, status: StatusCode, body: &str) -> GatewayError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => GatewayError::Unauthorized {
            supplier,
            status: status.as_u16(),
        },
        StatusCode::TOO_MANY_REQUESTS => GatewayError::RateLimited(supplier),
        _ => GatewayError::Http {
            supplier,
            status: status.as_u16(),
            message: truncate(body.trim(), MAX_ERROR_BODY),
        },
    }
}

/// Pull the first choice's message text out of a response body
fn extract_content(body: &str) -> Result<String, GatewayError> {
    let response: ChatResponse =
        serde_json::from_str(body).map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;

    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|content| !content.trim().is_empty())
        .ok_or(GatewayError::EmptyResponse)
}

fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use kgen_core::OutputLanguage;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn prompt() -> PromptPayload {
        PromptPayload {
            system: "Return JSON.".to_string(),
            user: "Text:\nAlice knows Bob.".to_string(),
            temperature: 0.1,
            language: OutputLanguage::English,
        }
    }

    fn gateway(config: LlmConfig) -> ChatCompletionsGateway {
        ChatCompletionsGateway::new(config).unwrap()
    }

    /// Serve one canned HTTP response on a local port and return its base URL
    async fn serve_once(status_line: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            read_request(&mut stream).await;
            let response = format!(
                "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).await.unwrap();
            stream.shutdown().await.ok();
        });

        format!("http://{addr}")
    }

    /// Read headers and the declared body so the client sees a clean exchange
    async fn read_request(stream: &mut tokio::net::TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = stream.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);

            let text = String::from_utf8_lossy(&buf);
            if let Some(header_end) = text.find("\r\n\r\n") {
                let content_length = text[..header_end]
                    .lines()
                    .find_map(|line| {
                        let (name, value) = line.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if buf.len() >= header_end + 4 + content_length {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    }

    #[test]
    fn test_deepseek_endpoint() {
        let endpoint = gateway(LlmConfig::default())
            .endpoint(Supplier::DeepSeek)
            .unwrap();
        assert_eq!(endpoint.url, "https://api.deepseek.com/v1/chat/completions");
        assert_eq!(endpoint.model.as_deref(), Some("deepseek-chat"));
        assert_eq!(endpoint.auth, Auth::Bearer);
    }

    #[test]
    fn test_zhipu_endpoint() {
        let endpoint = gateway(LlmConfig::default())
            .endpoint(Supplier::Zhipu)
            .unwrap();
        assert_eq!(
            endpoint.url,
            "https://open.bigmodel.cn/api/paas/v4/chat/completions"
        );
        assert_eq!(endpoint.model.as_deref(), Some("glm-4-flash"));
    }

    #[test]
    fn test_azure_endpoint() {
        let config = LlmConfig {
            azure_endpoint: Some("https://res.openai.azure.com/".to_string()),
            azure_deployment: Some("gpt-4o".to_string()),
            ..Default::default()
        };
        let endpoint = gateway(config).endpoint(Supplier::Azure).unwrap();
        assert_eq!(
            endpoint.url,
            "https://res.openai.azure.com/openai/deployments/gpt-4o/chat/completions?api-version=2024-06-01"
        );
        assert_eq!(endpoint.model, None);
        assert_eq!(endpoint.auth, Auth::ApiKeyHeader);
    }

    #[test]
    fn test_azure_requires_endpoint() {
        let err = gateway(LlmConfig::default())
            .endpoint(Supplier::Azure)
            .unwrap_err();
        assert!(matches!(err, GatewayError::Misconfigured(_)));
    }

    #[test]
    fn test_request_body_shape() {
        let p = prompt();
        let request = ChatRequest {
            model: Some("deepseek-chat"),
            messages: vec![
                Message {
                    role: "system",
                    content: &p.system,
                },
                Message {
                    role: "user",
                    content: &p.user,
                },
            ],
            max_tokens: 4096,
            temperature: 0.5,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "deepseek-chat");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "Text:\nAlice knows Bob.");

        let azure = ChatRequest {
            model: None,
            ..request
        };
        assert!(serde_json::to_value(&azure).unwrap().get("model").is_none());
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_error(Supplier::Zhipu, StatusCode::UNAUTHORIZED, ""),
            GatewayError::Unauthorized {
                supplier: Supplier::Zhipu,
                status: 401
            }
        );
        assert_eq!(
            status_error(Supplier::DeepSeek, StatusCode::TOO_MANY_REQUESTS, ""),
            GatewayError::RateLimited(Supplier::DeepSeek)
        );
        assert!(matches!(
            status_error(Supplier::DeepSeek, StatusCode::BAD_GATEWAY, " upstream down "),
            GatewayError::Http { status: 502, ref message, .. } if message == "upstream down"
        ));
    }

    #[test]
    fn test_extract_content() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"{\"nodes\":[]}"}}]}"#;
        assert_eq!(extract_content(body).unwrap(), r#"{"nodes":[]}"#);

        assert_eq!(
            extract_content(r#"{"choices":[]}"#).unwrap_err(),
            GatewayError::EmptyResponse
        );
        assert_eq!(
            extract_content(r#"{"choices":[{"message":{"content":null}}]}"#).unwrap_err(),
            GatewayError::EmptyResponse
        );
        assert!(matches!(
            extract_content("<html>").unwrap_err(),
            GatewayError::InvalidResponse(_)
        ));
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("知识图谱", 2), "知识...");
        assert_eq!(truncate("short", 10), "short");
    }

    #[tokio::test]
    async fn test_blank_key_rejected_before_request() {
        let err = gateway(LlmConfig::default())
            .call(&prompt(), Supplier::DeepSeek, "  ", 0.1)
            .await
            .unwrap_err();
        assert_eq!(err, GatewayError::MissingApiKey(Supplier::DeepSeek));
    }

    #[tokio::test]
    async fn test_successful_call() {
        let base_url = serve_once(
            "200 OK",
            r#"{"choices":[{"message":{"role":"assistant","content":"{\"nodes\":[],\"edges\":[]}"}}]}"#,
        )
        .await;
        let config = LlmConfig {
            deepseek_base_url: base_url,
            ..Default::default()
        };

        let reply = gateway(config)
            .call(&prompt(), Supplier::DeepSeek, "sk-test", 0.1)
            .await
            .unwrap();
        assert_eq!(reply, r#"{"nodes":[],"edges":[]}"#);
    }

    #[tokio::test]
    async fn test_unauthorized_call() {
        let base_url = serve_once("401 Unauthorized", r#"{"error":"bad key"}"#).await;
        let config = LlmConfig {
            zhipu_base_url: base_url,
            ..Default::default()
        };

        let err = gateway(config)
            .call(&prompt(), Supplier::Zhipu, "bad", 0.1)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            GatewayError::Unauthorized {
                supplier: Supplier::Zhipu,
                status: 401
            }
        );
    }

    #[tokio::test]
    async fn test_timeout_maps_to_timeout_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(stream);
        });

        let config = LlmConfig {
            deepseek_base_url: format!("http://{addr}"),
            timeout_secs: 1,
            ..Default::default()
        };
        let err = gateway(config)
            .call(&prompt(), Supplier::DeepSeek, "sk-test", 0.1)
            .await
            .unwrap_err();
        assert_eq!(err, GatewayError::Timeout { secs: 1 });
    }
}
