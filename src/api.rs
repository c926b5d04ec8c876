use anyhow::{Context, Result};
use caligula_backend::conversation::ConversationMessage;
use serde::{Deserialize, Serialize};

const CORRELATION_HEADER: &str = "x-correlation-id";

#[derive(Debug, Clone, Deserialize)]
pub struct HealthStatus {
    pub ok: bool,
    pub cid: String,
}

/// Body of a `/api/chat` response, success or failure.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatReply {
    pub success: bool,
    #[serde(default)]
    pub reply: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub cid: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
}

impl ChatReply {
    /// The reply text, or the line to show the user instead.
    pub fn into_text(self) -> Result<String, String> {
        let reference = self.cid.as_deref().unwrap_or("n/a").to_string();
        match (self.success, self.reply) {
            (true, Some(reply)) => Ok(reply),
            _ => Err(match self.error {
                Some(error) => format!("{}. Reference: {}", error, reference),
                None => format!("Model not reachable. Reference: {}", reference),
            }),
        }
    }

    pub fn is_local(&self) -> bool {
        self.source.as_deref() == Some("local")
    }
}

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn from_env() -> Self {
        let base = std::env::var("CALIGULA_BACKEND_URL")
            .ok()
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| "http://127.0.0.1:5174".to_string());
        Self::new(base)
    }

    pub fn new(base_url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: normalize_base_url(&base_url),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn health(&self) -> Result<HealthStatus> {
        self.request(reqwest::Method::GET, "/api/health")
            .send()
            .await?
            .error_for_status()
            .context("GET /api/health failed")?
            .json::<HealthStatus>()
            .await
            .context("Failed to decode health response")
    }

    /// Post the whole conversation. 4xx/5xx responses always come back as a
    /// failed `ChatReply`; only transport failures and undecodable success
    /// bodies error.
    pub async fn chat(&self, messages: &[ConversationMessage]) -> Result<ChatReply> {
        #[derive(Serialize)]
        struct ChatRequest<'a> {
            messages: &'a [ConversationMessage],
        }

        let response = self
            .request(reqwest::Method::POST, "/api/chat")
            .json(&ChatRequest { messages })
            .send()
            .await
            .context("POST /api/chat failed")?;

        let status = response.status();
        let header_cid = response
            .headers()
            .get(CORRELATION_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response
            .text()
            .await
            .context("Failed to read chat response")?;
        decode_chat_body(status, header_cid, &body)
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        self.http.request(method, url)
    }
}

fn decode_chat_body(
    status: reqwest::StatusCode,
    header_cid: Option<String>,
    body: &str,
) -> Result<ChatReply> {
    match serde_json::from_str::<ChatReply>(body) {
        Ok(mut reply) => {
            if reply.cid.is_none() {
                reply.cid = header_cid;
            }
            Ok(reply)
        }
        Err(e) if !status.is_success() => {
            tracing::debug!("Undecodable {} body: {}", status, e);
            Ok(ChatReply {
                success: false,
                reply: None,
                error: Some(format!("API error ({})", status.as_u16())),
                cid: header_cid,
                source: None,
            })
        }
        Err(e) => Err(e).with_context(|| {
            format!(
                "Unexpected chat payload ({}). Preview: {}",
                status,
                body.chars().take(200).collect::<String>()
            )
        }),
    }
}

fn normalize_base_url(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("http://{}", trimmed)
    }
}
