//! Configuration for the generation service client.

/// Configuration for the vLLM-backed generation endpoint.
///
/// # Fields
///
/// - `endpoint`: Base URL of the OpenAI-compatible server (no trailing path).
/// - `base_model`: Model identifier used when no per-user adapter is served.
/// - `max_tokens`: Maximum number of tokens to generate.
/// - `temperature` / `top_p`: Sampling knobs; review comments want low
///   temperature so the voice stays consistent.
/// - `timeout_secs`: Request timeout. Generation can hold the connection for
///   the full inference duration, so the default is generous.
#[derive(Debug, Clone)]
pub struct VllmConfig {
    pub endpoint: String,
    pub base_model: String,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub timeout_secs: Option<u64>,
}

impl VllmConfig {
    /// Load configuration from environment variables with serving defaults.
    pub fn from_env() -> Self {
        Self {
            endpoint: std::env::var("VLLM_URL")
                .unwrap_or_else(|_| "http://localhost:8000".into()),
            base_model: std::env::var("VLLM_MODEL")
                .unwrap_or_else(|_| "meta-llama/Meta-Llama-3.1-8B-Instruct".into()),
            max_tokens: Some(1024),
            temperature: Some(0.2),
            top_p: Some(0.95),
            timeout_secs: std::env::var("VLLM_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .or(Some(300)),
        }
    }
}
