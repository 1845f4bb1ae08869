//! Error handling utilities for route handlers

use axum::http::StatusCode;

/// Extension trait for logging errors and converting to StatusCode
pub trait LogErr<T> {
    /// Log a server-side fault at error level and answer with `status`,
    /// which may be a client status when the fault is caused by the input
    fn log_fault(self, context: &str, status: StatusCode) -> Result<T, StatusCode>;
}

impl<T, E: std::fmt::Display> LogErr<T> for Result<T, E> {
    fn log_fault(self, context: &str, status: StatusCode) -> Result<T, StatusCode> {
        self.map_err(|e| {
            log::error!("{}: {}", context, e);
            status
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_map_to_status() {
        let err: Result<(), &str> = Err("boom");
        assert_eq!(
            err.log_fault("ctx", StatusCode::BAD_REQUEST).unwrap_err(),
            StatusCode::BAD_REQUEST
        );

        let ok: Result<u8, &str> = Ok(7);
        assert_eq!(ok.log_fault("ctx", StatusCode::BAD_REQUEST).unwrap(), 7);
    }
}
