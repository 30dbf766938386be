/// Shared error type used across all investigation-runtime crates.
///
/// Each variant corresponds to one class in the error taxonomy: admission,
/// contract, transient (absorbed below this layer — only exhaustion crosses
/// here), fatal downstream, orchestration, and durability errors.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config: {0}")]
    Config(String),

    // ── Admission errors ────────────────────────────────────────────
    #[error("active session capacity exceeded (max {max})")]
    CapacityExceeded { max: usize },

    #[error("unknown scenario: {0}")]
    ScenarioUnknown(String),

    // ── Contract errors ─────────────────────────────────────────────
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    // ── Transient network errors (only exhaustion should escape a backend) ──
    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: f64 },

    #[error("cold start timeout")]
    ColdStart,

    #[error("continuation required: {token}")]
    Continuation { token: String },

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("connection dropped: {0}")]
    ConnectionDropped(String),

    // ── Fatal downstream errors ──────────────────────────────────────
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("permanent service failure: {0}")]
    PermanentServiceFailure(String),

    // ── Resource / throttling errors ─────────────────────────────────
    #[error("circuit open, retry after {retry_after_secs:.0}s")]
    CircuitOpen { retry_after_secs: f64 },

    // ── Orchestration errors ─────────────────────────────────────────
    #[error("run failed: {0}")]
    RunFailed(String),

    #[error("stall detected: no events for {secs}s")]
    StallDetected { secs: u64 },

    #[error("no response produced")]
    NoResponse,

    // ── Durability errors (logged only, never surfaced to callers) ──
    #[error("persist failed: {0}")]
    PersistFailed(String),

    #[error("http: {0}")]
    Http(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// True for errors that belong to the "transient network" class a
    /// backend's own retry ladder is expected to absorb before it ever
    /// reaches this enum. Kept here as a single point of truth so callers
    /// above the backend boundary can tell exhausted-transient errors
    /// apart from contract/fatal ones.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::RateLimited { .. }
                | Error::ColdStart
                | Error::Continuation { .. }
                | Error::Timeout(_)
                | Error::ConnectionDropped(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
