//! Unified error type for the approval workflow.
//!
//! Every fallible operation in the crate returns [`Result`]. Variants that are
//! reported back to a chat participant have a matching text in
//! [`Error::user_message`].

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Invalid amount: {amount}")]
    InvalidAmount { amount: f64 },

    #[error("Invalid description: {message}")]
    InvalidDescription { message: String },

    #[error("Invalid escalation bands: {message}")]
    InvalidBands { message: String },

    #[error("Order #{order_id} not found")]
    OrderNotFound { order_id: i64 },

    #[error("Order #{order_id} was already handled")]
    StaleAction { order_id: i64 },

    #[error("User '{user}' is not registered")]
    UserNotFound { user: String },

    #[error("Permission denied: {message}")]
    PermissionDenied { message: String },

    #[error("No approval chain configured for user #{initiator_id}")]
    ChainMissing { initiator_id: i64 },

    #[error("A reason is required to reject an order")]
    ReasonRequired,

    #[error("Reply is {length} characters long, the limit is {limit}")]
    ReplyTooLong { length: usize, limit: usize },

    #[error("Only the final approval may carry a note")]
    NoteNotAllowed,

    #[error("Delivery failed: {message}")]
    Delivery { message: String },

    #[error("Exchange rate lookup failed: {message}")]
    ExchangeRate { message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),

    #[error("Discord error: {0}")]
    Framework(Box<poise::serenity_prelude::Error>),
}

impl From<poise::serenity_prelude::Error> for Error {
    fn from(value: poise::serenity_prelude::Error) -> Self {
        Self::Framework(Box::new(value))
    }
}

impl Error {
    /// Text shown to the participant whose action failed.
    ///
    /// Internal failures (database, I/O, Discord) collapse into a generic
    /// message; their details only go to the log.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidAmount { .. } => {
                "❌ Cannot process this amount. Check the value and try again.".to_string()
            }
            Self::InvalidDescription { message } | Self::InvalidBands { message } => {
                format!("❌ {message}")
            }
            Self::OrderNotFound { order_id } => format!("❌ Order #{order_id} does not exist."),
            Self::StaleAction { order_id } => {
                format!("ℹ️ Order #{order_id} has already been handled.")
            }
            Self::UserNotFound { .. } => {
                "❌ You are not registered yet. Use `/start` and wait for an administrator."
                    .to_string()
            }
            Self::PermissionDenied { message } => format!("⛔ {message}"),
            Self::ChainMissing { .. } => {
                "❌ No inspectors are assigned to you yet. Contact an administrator.".to_string()
            }
            Self::ReasonRequired => "❌ Please write the reason for the rejection.".to_string(),
            Self::ReplyTooLong { length, limit } => format!(
                "❌ The text is {length} characters long; the limit is {limit}. Please shorten it."
            ),
            Self::NoteNotAllowed => {
                "❌ A note can only be added by the final approver. Press *Skip* instead."
                    .to_string()
            }
            Self::Delivery { .. } => {
                "❌ Could not deliver the order to the chat. Please try again.".to_string()
            }
            _ => "❌ Something went wrong. Please try again later.".to_string(),
        }
    }
}

// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_internal_errors_hide_details() {
        let err = Error::Database(sea_orm::DbErr::Custom("disk full".to_string()));
        assert!(!err.user_message().contains("disk full"));
        assert!(err.to_string().contains("disk full"));
    }

    #[test]
    fn test_stale_action_mentions_order() {
        let err = Error::StaleAction { order_id: 42 };
        assert!(err.user_message().contains("#42"));
    }
}
