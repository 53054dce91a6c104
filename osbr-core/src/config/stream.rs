//! Per-stream routing configuration.

/// Default cap on events buffered for one identifier.
pub const DEFAULT_MAX_PENDING: usize = 256;

/// How connect URLs reach one consumer service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConfig {
    /// Path prefix matched against the connect URL.
    pub prefix: String,
    /// Query parameter carrying the namespace-local id.
    pub id_param: String,
    /// Name of the inline event sent on accept when nothing was pending.
    pub ready_event: Option<String>,
    /// Events kept per identifier while nobody listens; the oldest go first.
    pub max_pending: usize,
}

impl StreamConfig {
    pub fn new(prefix: impl Into<String>, id_param: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            id_param: id_param.into(),
            ready_event: None,
            max_pending: DEFAULT_MAX_PENDING,
        }
    }

    pub fn with_ready_event(mut self, name: impl Into<String>) -> Self {
        self.ready_event = Some(name.into());
        self
    }

    pub fn with_max_pending(mut self, max_pending: usize) -> Self {
        self.max_pending = max_pending;
        self
    }
}
