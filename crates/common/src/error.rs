use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppinError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("upstream error: {0}")]
    Upstream(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type AppinResult<T> = Result<T, AppinError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_category_prefix() {
        let err = AppinError::Upstream("list fetch failed".to_string());
        assert_eq!(err.to_string(), "upstream error: list fetch failed");

        let err = AppinError::Config("GRAPH_SITE_ID is required but not set".to_string());
        assert!(err.to_string().starts_with("configuration error:"));
    }
}
