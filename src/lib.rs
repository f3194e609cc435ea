//! Keeps a vector-search index in step with a directory of markdown notes.
//!
//! A filesystem watcher observes the notes directory and turns every
//! create, modify, move, and delete into exactly one store operation. A full
//! reconciliation pass runs at startup (and optionally on a timer) to catch up
//! on anything the watcher missed. The file path is the join key between disk
//! and index; each record keeps a stable id across edits and renames.
//!
//! # Architecture
//!
//! - **Storage**: SQLite with [sqlite-vec](https://github.com/asg017/sqlite-vec)
//!   for vector search
//! - **Embeddings**: Local ONNX Runtime with all-MiniLM-L6-v2 (384 dimensions)
//! - **Watching**: [`notify`] recursive subscription drained by one worker thread
//!
//! # Modules
//!
//! - [`config`] - Configuration loading from TOML files and environment variables
//! - [`db`] - SQLite database initialization, schema, migrations, and status
//! - [`embedding`] - Text-to-vector embedding pipeline via ONNX Runtime
//! - [`note`] - Markdown file loading and frontmatter parsing
//! - [`store`] - The record store interface and its SQLite implementation
//! - [`sync`] - Event filtering, dispatch, reconciliation, and the watcher lifecycle

pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod note;
pub mod store;
pub mod sync;
