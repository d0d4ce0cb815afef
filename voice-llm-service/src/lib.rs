//! Client for the personalized review-voice generation service.
//!
//! The actual model serving (vLLM with per-user LoRA adapters over a shared
//! base model) lives behind an OpenAI-compatible HTTP endpoint; this crate is
//! the thin typed client the review pipeline talks to:
//! - [`config::VllmConfig`] — endpoint/model/sampling knobs from env.
//! - [`prompt`] — the review system prompt and message assembly.
//! - [`services::vllm_service::VllmService`] — streaming chat-completions
//!   client that selects the reviewer's LoRA adapter per request.

pub mod config;
pub mod prompt;
pub mod services;

pub use config::VllmConfig;
pub use services::vllm_service::{GenerationRequest, VllmError, VllmService};
