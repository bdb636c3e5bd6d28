//! Question answering over a directory of regulation documents.
//!
//! Documents are split into overlapping chunks, embedded through a hosted
//! embedding API and kept in a local SQLite index. Questions retrieve the most
//! similar chunks, which a hosted generative model turns into an answer.

pub mod config;
pub mod docx;
pub mod pipeline;
pub mod rag;
pub mod web;

#[cfg(test)]
mod testing;
