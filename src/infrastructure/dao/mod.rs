//! Data-access objects built on the connection manager's retrying primitives

pub mod request_logs;
pub mod text_storage;

pub use request_logs::RequestLogDao;
pub use text_storage::TextStorageDao;
