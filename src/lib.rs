//! Runtime core of a retrieval-augmented recommendation system.
//!
//! Two Lambda functions share this library:
//! - `recommend` (query path): asks a completion model for candidate item
//!   types, embeds each candidate, searches the vector store per candidate
//!   and returns the merged, deduplicated matches.
//! - `load-item` (load path): embeds one item's text and inserts it into the
//!   vector store.
//!
//! Both functions serve a REST API and a WebSocket API at once; see
//! [`event::Transport`]. [`presigned_url`] signs the WebSocket handshake
//! URL for clients that cannot attach authorization headers.

pub mod bedrock;
pub mod database;
pub mod error;
pub mod event;
pub mod params;
pub mod pipeline;
pub mod presigned_url;
pub mod templates;
pub mod utils;
