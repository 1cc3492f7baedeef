//! Blocking REST client for the job queue server.
//!
//! The queue exposes three endpoints: `POST /token` (password in, JWT
//! out), `GET /job` (200 with image body + metadata headers, 204 when
//! empty, 401 when the token expired), and `POST /job` (multipart
//! result upload). The client is deliberately blocking -- each worker
//! thread polls sequentially and never overlaps requests.

pub mod client;
pub mod error;

pub use client::{Poll, QueueClient, SubmitReceipt};
pub use error::QueueError;
