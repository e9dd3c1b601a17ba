//! caseflow: a pull-based pipeline that moves insurance cases through
//! NEW → CLASSIFICATION → DATA_EXTRACTION → PROCESSING → DONE.
//!
//! Each stage has its own processor polling the record store for the oldest
//! case in its input stage. Classification OCRs the uploaded document and asks
//! a language model for a configured (line of business, process) pair.

pub mod anthropic;
pub mod artifact;
pub mod config;
pub mod control;
pub mod engine;
pub mod error;
pub mod lifecycle;
pub mod ocr;
pub mod pipeline_config;
pub mod processor;
pub mod provider;
pub mod services;
pub mod state_machine;
pub mod store;

pub use error::PipelineError;
