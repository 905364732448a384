//! REST API for driving dialogue sessions.
//!
//! Axum routes under `/api/v1/`, answered in the envelope format from
//! [`response`].

pub mod error;
pub mod handlers;
pub mod response;
pub mod router;
