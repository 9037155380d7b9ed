//! Request payloads accepted by the backend.

mod payload;

pub use payload::{SaveRequest, INVALID_BODY, USER_ID_MISSING, USER_ID_REQUIRED};
