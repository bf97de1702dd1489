use imagegen_core::CoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("amount {0} is outside the allowed range (0, {1}]")]
    AmountOutOfRange(i64, i64),

    #[error("insufficient funds: balance {balance}, required {required}")]
    InsufficientFunds { balance: i64, required: i64 },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl From<LedgerError> for CoreError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::AmountOutOfRange(amount, cap) => CoreError::Validation(format!(
                "amount {amount} is outside the allowed range (0, {cap}]"
            )),
            LedgerError::InsufficientFunds { balance, required } => {
                CoreError::InsufficientFunds { balance, required }
            }
            LedgerError::Database(e) => CoreError::Internal(anyhow::anyhow!(e)),
            LedgerError::Core(e) => e,
        }
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;
