pub mod vllm_service;
