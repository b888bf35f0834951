//! HTTP control API: routes, authentication, DTOs, event stream and OpenAPI documentation.

pub mod auth;
pub mod dto;
pub mod error;
pub mod events;
pub mod openapi;
pub mod routes;
pub mod state;
