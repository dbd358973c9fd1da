//! Docent - Conversational Study Assistant
//!
//! Answers questions about a persisted document index. Every chat session
//! builds its own retrieval pipeline (embed, vector search, rerank, generate)
//! and streams the model's answer back token by token.

pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod index;
pub mod llm;
pub mod pipeline;
pub mod prompt;
pub mod rerank;
pub mod server;
pub mod session;

pub use error::{DocentError, Result};
