pub mod auth;
pub mod health_route;
pub mod webhook;
