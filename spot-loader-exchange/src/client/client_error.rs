use binance::errors::{Error as BinanceError, ErrorKind as BinanceErrorKind};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("binance error: {0}")]
    BinanceError(String),

    #[error("blocking request aborted: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("invalid credentials: {0}")]
    Credentials(String),
}

// binance 的错误类型不是 Sync, 这里只保留错误信息
impl From<BinanceError> for ClientError {
    fn from(error: BinanceError) -> Self {
        ClientError::BinanceError(fetch_binance_error(&error))
    }
}

fn fetch_binance_error(error: &BinanceError) -> String {
    match error.0 {
        BinanceErrorKind::BinanceError(ref binance_content_error) => {
            format!("{} (code {})", binance_content_error.msg, binance_content_error.code)
        }
        _ => error.0.to_string(),
    }
}
