use thiserror::Error;

#[derive(Error, Debug)]
pub enum CubeError {
    #[error("unknown cube id: '{0}' (see --info for the supported ids)")]
    UnknownCube(String),

    #[error("request failed{}: {message}", status_suffix(.status))]
    Network {
        status: Option<u16>,
        message: String,
    },

    #[error("malformed response: {0}")]
    Parse(String),

    #[error("response has a header but no data rows")]
    EmptyResult,

    #[error("cannot pivot table: {0}")]
    Reshape(String),

    #[error("invalid base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

pub type CubeResult<T> = Result<T, CubeError>;

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" with HTTP {}", s)).unwrap_or_default()
}

impl From<reqwest::Error> for CubeError {
    fn from(err: reqwest::Error) -> Self {
        CubeError::Network {
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }
}

impl From<csv::Error> for CubeError {
    fn from(err: csv::Error) -> Self {
        let message = err.to_string();
        match err.into_kind() {
            csv::ErrorKind::Io(io) => CubeError::Io(io),
            _ => CubeError::Parse(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_error_mentions_status_when_known() {
        let err = CubeError::Network {
            status: Some(400),
            message: "Bad Request".into(),
        };
        assert_eq!(err.to_string(), "request failed with HTTP 400: Bad Request");

        let err = CubeError::Network {
            status: None,
            message: "connection refused".into(),
        };
        assert_eq!(err.to_string(), "request failed: connection refused");
    }
}
