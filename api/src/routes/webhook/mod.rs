pub mod dedup;
pub mod event;
pub mod orchestrator;
pub mod webhook_route;
