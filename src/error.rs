use thiserror::Error;

/// Failure to retrieve one rendered results page. Transient by assumption;
/// the pagination driver retries before degrading to a partial run.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("browser navigation failed for page {page}: {reason}")]
    Navigation { page: u32, reason: String },
    #[error("timed out waiting for listing cards on page {page}")]
    RenderTimeout { page: u32 },
    #[error("could not capture page html for page {page}: {reason}")]
    Capture { page: u32, reason: String },
}

/// A raw listing card that cannot become a record. Only the detail URL is
/// required; every other field degrades to absent instead.
#[derive(Debug, Error)]
pub enum NormalizationError {
    #[error("listing card on page {page} has no detail url")]
    MissingUrl { page: u32 },
}

/// Sheet or notifier failure. Logged by the coordinator; ends the cycle
/// cleanly without reaching the scheduler as a panic.
#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("sheets api request failed: {0}")]
    Sheets(String),
    #[error("notification delivery failed: {0}")]
    Notify(String),
}
