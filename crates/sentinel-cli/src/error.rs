//! CLI error types.

use std::fmt;
use std::path::PathBuf;

use sentinel_ledger::LedgerError;

/// CLI-specific errors.
#[derive(Debug)]
pub enum CliError {
    /// The ledger rejected the operation.
    Ledger(LedgerError),
    /// No state file at the given path.
    NotInitialized(PathBuf),
    /// A state file already exists.
    AlreadyInitialized(PathBuf),
    /// Output formatting error.
    Format(String),
    /// IO error.
    Io(std::io::Error),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ledger(e) => write!(f, "{e}"),
            Self::NotInitialized(path) => write!(
                f,
                "no ledger at {}, run `sentinel init` first",
                path.display()
            ),
            Self::AlreadyInitialized(path) => write!(
                f,
                "ledger already exists at {}, pass --force to overwrite",
                path.display()
            ),
            Self::Format(msg) => write!(f, "format error: {msg}"),
            Self::Io(e) => write!(f, "IO error: {e}"),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Ledger(e) => Some(e),
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<LedgerError> for CliError {
    fn from(err: LedgerError) -> Self {
        Self::Ledger(err)
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentinel_ledger::Address;

    #[test]
    fn ledger_errors_display_unchanged() {
        let err = CliError::from(LedgerError::NotOwner {
            caller: Address::from_bytes([1; 20]),
        });
        assert_eq!(
            err.to_string(),
            "0x0101010101010101010101010101010101010101 is not the ledger owner"
        );
    }

    #[test]
    fn not_initialized_mentions_init() {
        let err = CliError::NotInitialized(PathBuf::from("ledger.json"));
        assert!(err.to_string().contains("sentinel init"));
    }

    #[test]
    fn from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        assert!(matches!(CliError::from(io_err), CliError::Io(_)));
    }
}
