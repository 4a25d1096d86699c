//! Collaborators backed by the back-office admin API.
//!
//! Every endpoint answers with the `CommonResp` envelope
//! `{"success": bool, "message": string?, "content": T?}`.

mod client;

pub use client::BackofficeClient;
