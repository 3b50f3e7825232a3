pub type AppResult<T> = Result<T, AppError>;

/// Application error taxonomy.
///
/// Business-rule violations are user-correctable and surface as-is;
/// infrastructure failures carry their source so the causal chain survives
/// propagation. No caller retries: a failed bid or batch step ends that
/// attempt.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // --- business-rule violations ---
    #[error("item not found")]
    ItemNotFound,

    #[error("user not found")]
    UserNotFound,

    #[error("finished item cannot be bid")]
    ItemFinished,

    #[error("cannot bid on your own item")]
    OwnItem,

    #[error("cannot publish another user's item")]
    NotOwner,

    #[error("only a drafted item can be published")]
    ItemNotDraft,

    #[error("bid is not larger than the start price")]
    BidNotAboveStart,

    #[error("bid is not larger than the current highest bid")]
    BidNotAboveHighest,

    #[error("insufficient balance")]
    InsufficientBalance,

    #[error("amount must be positive")]
    NonPositiveAmount,

    #[error("user already bid within the last {0} seconds")]
    CooldownActive(u64),

    // --- infrastructure failures ---
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),

    #[error("cache error: {0}")]
    Cache(#[from] redis::RedisError),

    /// Re-contextualized error keeping its cause.
    #[error("{context}")]
    Context {
        context: String,
        #[source]
        source: Box<AppError>,
    },
}

impl AppError {
    /// Wrap this error with a caller-side context message.
    pub fn wrap(self, context: impl Into<String>) -> AppError {
        AppError::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Render the full causal chain for logging, outermost first.
    pub fn chain(&self) -> String {
        use std::error::Error;

        let mut out = self.to_string();
        let mut source = self.source();
        while let Some(err) = source {
            out.push_str(": ");
            out.push_str(&err.to_string());
            source = err.source();
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_renders_outermost_first() {
        let err = AppError::InsufficientBalance
            .wrap("error placing bid")
            .wrap("bid request failed");

        assert_eq!(
            err.chain(),
            "bid request failed: error placing bid: insufficient balance"
        );
    }

    #[test]
    fn bare_error_chain_is_its_message() {
        assert_eq!(AppError::ItemNotFound.chain(), "item not found");
    }
}
