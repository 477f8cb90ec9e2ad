//! Gmail integration client for an email-triage front end: an explicit OAuth
//! token session, inbox listing with header enrichment, plain-text body
//! extraction from MIME trees, and threaded replies sent as raw RFC-822.

pub mod config;
pub mod error;
pub mod gmail;
pub mod output;

pub use config::GmailConfig;
pub use error::{GmailError, Result};
