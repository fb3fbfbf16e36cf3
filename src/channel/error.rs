//! Channel error types
//!
//! Errors surfaced by channel operations. Subscriber callback failures are
//! deliberately absent: they are caught and counted by the owning worker and
//! never reach the producer.

/// Error type for channel operations
#[derive(Debug, Clone)]
pub enum ChannelError {
    /// Subscriber configuration rejected at subscribe time
    InvalidConfig(String),
    /// A subscriber with this name is already registered
    DuplicateSubscriber(String),
    /// The channel has been closed; producer calls are no longer accepted
    Shutdown,
}

impl std::fmt::Display for ChannelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelError::InvalidConfig(reason) => {
                write!(f, "Invalid subscriber config: {}", reason)
            }
            ChannelError::DuplicateSubscriber(name) => {
                write!(f, "Subscriber already registered: {}", name)
            }
            ChannelError::Shutdown => write!(f, "Channel is shut down"),
        }
    }
}

impl std::error::Error for ChannelError {}
