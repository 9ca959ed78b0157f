use super::{FailureKind, GroundingSource, ModelClient, ModelError, ModelReply, ModelRequest};
use futures_core::future::BoxFuture;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/";

/// Per-process knobs sent with every request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationOptions {
    pub temperature: Option<f64>,
    /// Attach the Google Search tool and collect the pages it cites.
    pub grounding: bool,
}

#[derive(Debug, Clone)]
pub struct GoogleClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    endpoint: Url,
    options: GenerationOptions,
}

impl GoogleClient {
    pub fn new(
        http: reqwest::Client,
        api_key: String,
        model: String,
        api_base: Option<&str>,
        options: GenerationOptions,
    ) -> anyhow::Result<Self> {
        // The SDKs accept both `gemini-1.5-flash` and `models/gemini-1.5-flash`.
        let model = model.strip_prefix("models/").unwrap_or(&model).to_string();
        let endpoint = endpoint_for(api_base.unwrap_or(DEFAULT_API_BASE), &model)?;

        Ok(Self {
            http,
            api_key,
            model,
            endpoint,
            options,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn headers(&self) -> Result<HeaderMap, ModelError> {
        let mut h = HeaderMap::new();
        h.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let key = HeaderValue::from_str(&self.api_key)
            .map_err(|_| ModelError::new(FailureKind::Auth, "API key contains invalid characters"))?;
        h.insert(HeaderName::from_static("x-goog-api-key"), key);
        Ok(h)
    }
}

impl ModelClient for GoogleClient {
    fn name(&self) -> &'static str {
        "google"
    }

    fn generate(&self, req: ModelRequest) -> BoxFuture<'static, Result<ModelReply, ModelError>> {
        let this = self.clone();

        Box::pin(async move {
            let headers = this.headers()?;
            let body = GenerateContentRequest::from_request(req, &this.options);

            tracing::debug!(
                model = %this.model,
                contents = body.contents.len(),
                grounding = this.options.grounding,
                "sending generateContent"
            );

            let resp = this
                .http
                .post(this.endpoint.clone())
                .headers(headers)
                .json(&body)
                .send()
                .await
                .map_err(|e| {
                    if e.is_timeout() {
                        ModelError::timeout(format!("request timed out: {e}"))
                    } else {
                        ModelError::transport(format!("request failed: {e}"))
                    }
                })?;

            let status = resp.status();
            let text = resp
                .text()
                .await
                .map_err(|e| ModelError::transport(format!("failed to read response: {e}")))?;

            if !status.is_success() {
                return Err(classify_status(status, &text));
            }

            let parsed: GenerateContentResponse = serde_json::from_str(&text)
                .map_err(|e| ModelError::malformed(format!("failed to parse response JSON: {e}")))?;

            let text = extract_text(&parsed)?;
            Ok(ModelReply {
                text,
                sources: extract_sources(&parsed),
            })
        })
    }
}

// Docs: https://ai.google.dev/api/generate-content
fn endpoint_for(api_base: &str, model: &str) -> anyhow::Result<Url> {
    let mut base = Url::parse(api_base)?;
    // `join` replaces the last segment unless the base ends in a slash.
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    Ok(base.join(&format!("v1beta/models/{model}:generateContent"))?)
}

fn classify_status(status: StatusCode, body: &str) -> ModelError {
    let detail = serde_json::from_str::<ErrorResponse>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.trim().to_string());

    let kind = match status.as_u16() {
        401 | 403 => FailureKind::Auth,
        429 => FailureKind::Quota,
        408 | 504 => FailureKind::Timeout,
        _ => FailureKind::Provider,
    };

    ModelError::new(kind, format!("Gemini API error: HTTP {status}: {detail}"))
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Tool>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct Tool {
    google_search: GoogleSearch,
}

#[derive(Debug, Clone, Serialize)]
struct GoogleSearch {}

impl GenerateContentRequest {
    fn from_request(req: ModelRequest, options: &GenerationOptions) -> Self {
        let system_instruction = if req.system_instruction.trim().is_empty() {
            None
        } else {
            Some(Content {
                role: None,
                parts: vec![Part {
                    text: Some(req.system_instruction),
                }],
            })
        };

        let mut contents: Vec<Content> = req
            .history
            .into_iter()
            .map(|h| Content {
                role: Some(h.role.as_str().to_string()),
                parts: h.parts.into_iter().map(|t| Part { text: Some(t) }).collect(),
            })
            .collect();

        contents.push(Content {
            role: Some("user".to_string()),
            parts: vec![Part {
                text: Some(req.prompt),
            }],
        });

        let tools = if options.grounding {
            vec![Tool {
                google_search: GoogleSearch {},
            }]
        } else {
            Vec::new()
        };

        Self {
            system_instruction,
            contents,
            generation_config: options.temperature.map(|temperature| GenerationConfig { temperature }),
            tools,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
    #[serde(default)]
    grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroundingMetadata {
    #[serde(default)]
    grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GroundingChunk {
    #[serde(default)]
    web: Option<WebChunk>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WebChunk {
    #[serde(default)]
    uri: Option<String>,
    #[serde(default)]
    title: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

fn extract_text(r: &GenerateContentResponse) -> Result<String, ModelError> {
    if let Some(reason) = r.prompt_feedback.as_ref().and_then(|f| f.block_reason.as_deref()) {
        return Err(ModelError::new(
            FailureKind::Provider,
            format!("prompt was blocked: {reason}"),
        ));
    }

    // Concatenate all text parts of the first candidate.
    let cand = r
        .candidates
        .first()
        .ok_or_else(|| ModelError::malformed("response has no candidates"))?;

    let mut out = String::new();
    if let Some(content) = &cand.content {
        for p in &content.parts {
            if let Some(t) = &p.text {
                out.push_str(t);
            }
        }
    }

    if out.is_empty() {
        let reason = cand.finish_reason.as_deref().unwrap_or("unknown");
        return Err(ModelError::malformed(format!(
            "response contained no text (finish reason: {reason})"
        )));
    }
    Ok(out)
}

/// Web pages cited by the first candidate, first mention wins.
fn extract_sources(r: &GenerateContentResponse) -> Vec<GroundingSource> {
    let chunks = r
        .candidates
        .first()
        .and_then(|c| c.grounding_metadata.as_ref())
        .map(|m| m.grounding_chunks.as_slice())
        .unwrap_or_default();

    let mut out: Vec<GroundingSource> = Vec::new();
    for web in chunks.iter().filter_map(|c| c.web.as_ref()) {
        let Some(uri) = web.uri.as_deref().filter(|u| !u.is_empty()) else {
            continue;
        };
        if out.iter().any(|s| s.uri == uri) {
            continue;
        }
        let title = web
            .title
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or(uri);
        out.push(GroundingSource {
            title: title.to_string(),
            uri: uri.to_string(),
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{HistoryEntry, ModelRole};
    use serde_json::json;

    fn request() -> ModelRequest {
        ModelRequest {
            system_instruction: "Be brief.".to_string(),
            history: vec![
                HistoryEntry {
                    role: ModelRole::User,
                    parts: vec!["A".to_string()],
                },
                HistoryEntry {
                    role: ModelRole::Model,
                    parts: vec!["reply A".to_string()],
                },
            ],
            prompt: "B".to_string(),
        }
    }

    #[test]
    fn request_body_puts_history_before_prompt() {
        let body = serde_json::to_value(GenerateContentRequest::from_request(
            request(),
            &GenerationOptions::default(),
        ))
        .unwrap();
        assert_eq!(
            body,
            json!({
                "systemInstruction": { "parts": [{ "text": "Be brief." }] },
                "contents": [
                    { "role": "user", "parts": [{ "text": "A" }] },
                    { "role": "model", "parts": [{ "text": "reply A" }] },
                    { "role": "user", "parts": [{ "text": "B" }] },
                ],
            })
        );
    }

    #[test]
    fn blank_system_instruction_is_omitted() {
        let mut req = request();
        req.system_instruction = "  ".to_string();
        let body =
            serde_json::to_value(GenerateContentRequest::from_request(req, &GenerationOptions::default()))
                .unwrap();
        assert!(body.get("systemInstruction").is_none());
    }

    #[test]
    fn temperature_and_search_tool_are_sent_when_configured() {
        let options = GenerationOptions {
            temperature: Some(0.2),
            grounding: true,
        };
        let body = serde_json::to_value(GenerateContentRequest::from_request(request(), &options)).unwrap();
        assert_eq!(body["generationConfig"], json!({ "temperature": 0.2 }));
        assert_eq!(body["tools"], json!([{ "googleSearch": {} }]));

        let body = serde_json::to_value(GenerateContentRequest::from_request(
            request(),
            &GenerationOptions::default(),
        ))
        .unwrap();
        assert!(body.get("generationConfig").is_none());
        assert!(body.get("tools").is_none());
    }

    fn client(model: &str, api_base: Option<&str>) -> GoogleClient {
        GoogleClient::new(
            reqwest::Client::new(),
            "test-key".to_string(),
            model.to_string(),
            api_base,
            GenerationOptions::default(),
        )
        .unwrap()
    }

    #[test]
    fn endpoint_targets_model() {
        let c = client("gemini-1.5-flash", None);
        assert_eq!(
            c.endpoint.as_str(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash:generateContent"
        );
        assert!(c.endpoint.query().is_none());
    }

    #[test]
    fn endpoint_keeps_base_path_and_accepts_prefixed_model() {
        let c = client("models/gemini-1.5-flash", Some("http://proxy/gemini"));
        assert_eq!(
            c.endpoint.as_str(),
            "http://proxy/gemini/v1beta/models/gemini-1.5-flash:generateContent"
        );
        assert_eq!(c.model(), "gemini-1.5-flash");

        let c = client("gemini-pro", Some("http://proxy/gemini/"));
        assert_eq!(
            c.endpoint.as_str(),
            "http://proxy/gemini/v1beta/models/gemini-pro:generateContent"
        );
    }

    #[test]
    fn text_parts_of_first_candidate_are_joined() {
        let r: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [
                { "content": { "role": "model", "parts": [{ "text": "Hi " }, { "text": "there" }] } },
                { "content": { "role": "model", "parts": [{ "text": "ignored" }] } }
            ]
        }))
        .unwrap();
        assert_eq!(extract_text(&r).unwrap(), "Hi there");
    }

    #[test]
    fn empty_candidates_are_malformed() {
        let r: GenerateContentResponse = serde_json::from_value(json!({})).unwrap();
        assert_eq!(extract_text(&r).unwrap_err().kind, FailureKind::MalformedResponse);

        let r: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{ "finishReason": "SAFETY" }]
        }))
        .unwrap();
        let err = extract_text(&r).unwrap_err();
        assert_eq!(err.kind, FailureKind::MalformedResponse);
        assert!(err.message.contains("SAFETY"));
    }

    #[test]
    fn blocked_prompt_reports_reason() {
        let r: GenerateContentResponse = serde_json::from_value(json!({
            "promptFeedback": { "blockReason": "OTHER" }
        }))
        .unwrap();
        let err = extract_text(&r).unwrap_err();
        assert_eq!(err.kind, FailureKind::Provider);
        assert!(err.message.contains("OTHER"));
    }

    #[test]
    fn grounding_chunks_become_sources() {
        let r: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": { "parts": [{ "text": "cited" }] },
                "groundingMetadata": {
                    "groundingChunks": [
                        { "web": { "uri": "https://a.example/", "title": "A" } },
                        { "web": { "uri": "https://a.example/", "title": "A again" } },
                        { "web": { "uri": "https://b.example/" } },
                        { "retrievedContext": {} }
                    ]
                }
            }]
        }))
        .unwrap();
        assert_eq!(
            extract_sources(&r),
            [
                GroundingSource {
                    title: "A".to_string(),
                    uri: "https://a.example/".to_string()
                },
                GroundingSource {
                    title: "https://b.example/".to_string(),
                    uri: "https://b.example/".to_string()
                },
            ]
        );
    }

    #[test]
    fn status_codes_map_to_kinds() {
        let body = r#"{"error":{"code":403,"message":"API key not valid"}}"#;
        let err = classify_status(StatusCode::FORBIDDEN, body);
        assert_eq!(err.kind, FailureKind::Auth);
        assert!(err.message.contains("API key not valid"));

        assert_eq!(classify_status(StatusCode::TOO_MANY_REQUESTS, "").kind, FailureKind::Quota);
        assert_eq!(classify_status(StatusCode::GATEWAY_TIMEOUT, "").kind, FailureKind::Timeout);

        let err = classify_status(StatusCode::INTERNAL_SERVER_ERROR, "oops");
        assert_eq!(err.kind, FailureKind::Provider);
        assert!(err.message.ends_with("oops"));
    }

    mod against_local_server {
        use super::*;
        use axum::extract::Path;
        use axum::http::HeaderMap;
        use axum::response::{IntoResponse, Response};
        use axum::routing::post;
        use axum::{Json, Router};
        use serde_json::Value;

        // The action segment looks like `<model>:generateContent`; the model
        // name picks the canned behavior.
        async fn fake_generate(
            Path(action): Path<String>,
            headers: HeaderMap,
            Json(body): Json<Value>,
        ) -> Response {
            let model = action.trim_end_matches(":generateContent");
            match model {
                "denied" => (
                    axum::http::StatusCode::FORBIDDEN,
                    Json(json!({ "error": { "code": 403, "message": "API key not valid" } })),
                )
                    .into_response(),
                "exhausted" => (
                    axum::http::StatusCode::TOO_MANY_REQUESTS,
                    Json(json!({ "error": { "code": 429, "message": "Resource has been exhausted" } })),
                )
                    .into_response(),
                "garbled" => "<html>not json</html>".into_response(),
                _ => {
                    let key = headers
                        .get("x-goog-api-key")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("none");
                    let turns = body["contents"].as_array().map(Vec::len).unwrap_or(0);
                    Json(json!({
                        "candidates": [{
                            "content": {
                                "role": "model",
                                "parts": [{ "text": format!("key={key} turns={turns}") }]
                            },
                            "groundingMetadata": {
                                "groundingChunks": [
                                    { "web": { "uri": "https://docs.example/", "title": "Docs" } }
                                ]
                            }
                        }]
                    }))
                    .into_response()
                }
            }
        }

        async fn spawn_server() -> String {
            let app = Router::new().route("/v1beta/models/:action", post(fake_generate));
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            tokio::spawn(async move {
                axum::serve(listener, app).await.unwrap();
            });
            format!("http://{addr}")
        }

        #[tokio::test]
        async fn sends_key_header_and_reads_reply() {
            let base = spawn_server().await;
            let reply = client("gemini-test", Some(&base))
                .generate(request())
                .await
                .unwrap();
            assert_eq!(reply.text, "key=test-key turns=3");
            assert_eq!(reply.sources.len(), 1);
            assert_eq!(reply.sources[0].title, "Docs");
        }

        #[tokio::test]
        async fn error_statuses_are_classified() {
            let base = spawn_server().await;

            let err = client("denied", Some(&base)).generate(request()).await.unwrap_err();
            assert_eq!(err.kind, FailureKind::Auth);
            assert!(err.message.contains("API key not valid"));

            let err = client("exhausted", Some(&base)).generate(request()).await.unwrap_err();
            assert_eq!(err.kind, FailureKind::Quota);

            let err = client("garbled", Some(&base)).generate(request()).await.unwrap_err();
            assert_eq!(err.kind, FailureKind::MalformedResponse);
        }

        #[tokio::test]
        async fn refused_connection_is_a_transport_failure() {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            drop(listener);

            let base = format!("http://{addr}");
            let err = client("gemini-test", Some(&base)).generate(request()).await.unwrap_err();
            assert_eq!(err.kind, FailureKind::Transport);
        }
    }
}
