//! # docchat
//!
//! The core library of a document-grounded chat service: conversation logs,
//! a document registry with a disabled-set side index, an idempotent
//! ingestion/indexing pipeline, and the retrieval-and-answer orchestration
//! pipeline (query rewriting, fanned-out hybrid search, relevance judging,
//! grounded synthesis).

pub mod conversations;
pub mod disabled;
pub mod errors;
pub mod ingest;
pub mod prompts;
pub mod providers;
pub mod registry;
pub mod retrieval;
pub mod rewrite;
pub mod synthesis;
pub mod types;

pub use errors::GatewayError;
