use thiserror::Error;

/// Failures talking to the spreadsheet service or reading its contents
#[derive(Debug, Error)]
pub enum SheetError {
    #[error("Cannot read header row of sheet '{sheet}'.")]
    NoHeader { sheet: String },

    /// Transport or API failure; the message is passed through untouched
    #[error("{0}")]
    Service(String),

    #[error("configuration error: {0}")]
    Config(String),
}

#[derive(Debug, Error)]
pub enum StatsError {
    #[error("STATUS column not found.")]
    StatusColumnNotFound,

    #[error("Match date column not found.")]
    DateColumnNotFound,

    #[error(transparent)]
    Sheet(#[from] SheetError),
}

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("Missing fields")]
    MissingFields,

    #[error("Username already exists.")]
    UsernameTaken,

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("No user data")]
    NoUserData,

    #[error("No client id left after C{0}")]
    ClientIdExhausted(u64),

    #[error("Password hashing failed: {0}")]
    Hash(String),

    #[error(transparent)]
    Sheet(#[from] SheetError),
}
