//! RPC Error Types
//!
//! Maps application errors to JSON-RPC error codes.

use jsonrpsee::types::ErrorObjectOwned;
use netbill_core::error::AppError;

/// RPC Error Codes
pub mod code {
    pub const VALIDATION_ERROR: i32 = 4000;
    pub const NOT_FOUND: i32 = 4001;
    pub const CONFLICT: i32 = 4002;
    pub const THROTTLED: i32 = 4003;
    pub const INTERNAL_ERROR: i32 = 5000;
    pub const DB_ERROR: i32 = 5001;
    pub const TRANSPORT_ERROR: i32 = 5003;
}

fn owned(code: i32, message: impl Into<String>) -> ErrorObjectOwned {
    ErrorObjectOwned::owned(code, message.into(), None::<()>)
}

/// Convert AppError to JSON-RPC ErrorObject
pub fn to_rpc_error(err: AppError) -> ErrorObjectOwned {
    match err {
        AppError::Validation(msg) => owned(code::VALIDATION_ERROR, msg),
        AppError::Domain(e) => owned(code::VALIDATION_ERROR, e.to_string()),
        AppError::Serialization(e) => owned(code::VALIDATION_ERROR, e.to_string()),
        AppError::NotFound(msg) => owned(code::NOT_FOUND, msg),
        AppError::Conflict(msg) => owned(code::CONFLICT, msg),
        AppError::InvalidState(msg) => owned(code::CONFLICT, msg),
        AppError::Database(msg) => owned(code::DB_ERROR, msg),
        AppError::Transport(e) => owned(code::TRANSPORT_ERROR, e.to_string()),
        AppError::Config(msg) | AppError::Internal(msg) => owned(code::INTERNAL_ERROR, msg),
    }
}

pub fn throttled() -> ErrorObjectOwned {
    owned(code::THROTTLED, "Rate limit exceeded. Please slow down.")
}
