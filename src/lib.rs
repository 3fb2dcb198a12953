//! mail-digest — resumable mailbox summarization pipeline.

pub mod checkpoint;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod llm;
pub mod mailbox;
pub mod pipeline;
