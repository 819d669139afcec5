use thiserror::Error;

/// Substrings chains and relayers use when an HTLC was already spent.
const SETTLED_MARKERS: &[&str] = &[
    "already redeemed",
    "already refunded",
    "already settled",
    "already fulfilled",
    "order fulfilled",
    "orderfulfilled",
    "htlc__orderfulfilled",
    "bad-txns-inputs-missingorspent",
    "txn-already-known",
];

const BALANCE_MARKERS: &[&str] = &[
    "insufficient balance",
    "insufficient funds",
    "exceeds balance",
];

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChainActionError {
    #[error("order already settled on-chain: {0}")]
    AlreadySettled(String),
    #[error("secret hash mismatch for order {order_id}")]
    SecretMismatch { order_id: String },
    #[error("no wallet configured for chain {0}")]
    NoWallet(String),
    #[error("unsupported chain action: {0}")]
    Unsupported(String),
    #[error("broadcast rejected: {0}")]
    Rejected(String),
}

impl ChainActionError {
    /// Maps a raw chain/relayer failure message onto the benign/genuine split.
    pub fn classify(message: impl Into<String>) -> Self {
        let message = message.into();
        let lowered = message.to_lowercase();
        if SETTLED_MARKERS.iter().any(|marker| lowered.contains(marker)) {
            Self::AlreadySettled(message)
        } else {
            Self::Rejected(message)
        }
    }

    pub fn is_benign(&self) -> bool {
        matches!(self, Self::AlreadySettled(_))
    }
}

#[derive(Debug, Error)]
pub enum SwapError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("transient network error: {0}")]
    Transient(String),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("insufficient balance: {0}")]
    InsufficientBalance(String),
    #[error(transparent)]
    ChainAction(#[from] ChainActionError),
    #[error("unexpected response from {service}: {message}")]
    Protocol {
        service: &'static str,
        message: String,
    },
}

impl SwapError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// Validation-class failures are never retried with the same parameters.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::InsufficientBalance(_))
    }

    pub fn is_benign(&self) -> bool {
        matches!(self, Self::ChainAction(err) if err.is_benign())
    }

    /// Builds the error for a non-success HTTP status, keeping the body verbatim.
    pub fn from_status(service: &'static str, status: u16, body: String) -> Self {
        let lowered = body.to_lowercase();
        match status {
            401 | 403 => Self::Auth(format!("{service} returned {status}: {body}")),
            408 | 429 | 500..=599 => Self::Transient(format!("{service} returned {status}: {body}")),
            _ if BALANCE_MARKERS.iter().any(|marker| lowered.contains(marker)) => {
                Self::InsufficientBalance(body)
            }
            400..=499 => Self::Validation(format!("{service} rejected request ({status}): {body}")),
            _ => Self::Protocol {
                service,
                message: format!("status {status}: {body}"),
            },
        }
    }

    /// Error payload returned inside an `{"status": "Error"}` envelope.
    pub fn from_service_message(service: &'static str, message: String) -> Self {
        let lowered = message.to_lowercase();
        if BALANCE_MARKERS.iter().any(|marker| lowered.contains(marker)) {
            Self::InsufficientBalance(message)
        } else {
            Self::Validation(format!("{service}: {message}"))
        }
    }
}

impl From<reqwest::Error> for SwapError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() || err.is_request() {
            Self::Transient(err.to_string())
        } else if err.is_decode() {
            Self::Protocol {
                service: "http",
                message: err.to_string(),
            }
        } else if let Some(status) = err.status() {
            Self::from_status("http", status.as_u16(), err.to_string())
        } else {
            Self::Transient(err.to_string())
        }
    }
}

impl From<serde_json::Error> for SwapError {
    fn from(err: serde_json::Error) -> Self {
        Self::Protocol {
            service: "json",
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SwapError>;
