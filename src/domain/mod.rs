//! Domain records stored by the data-access layer
//!
//! Text blobs created by the tool handlers and the audit records produced by
//! the request-logging middleware.

pub mod request_log;
pub mod text_entry;
pub mod types;

pub use request_log::{RequestLog, RequestLogRecord};
pub use text_entry::TextEntry;
pub use types::{PageLimit, TextContent, TextId};
