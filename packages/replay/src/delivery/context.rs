// packages/replay/src/delivery/context.rs
//! Correlation data accumulated between segments

/// Error ids, trace ids and URLs seen since the last delivered segment
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReplayEventContext {
    pub error_ids: Vec<String>,
    pub trace_ids: Vec<String>,
    pub urls: Vec<String>,

    /// Replay start (epoch ms); lowered by earlier events in segment 0
    pub initial_timestamp: u64,
    pub initial_url: Option<String>,

    /// Earliest event timestamp buffered since the last flush (epoch ms)
    pub earliest_event: Option<u64>,
}

impl ReplayEventContext {
    pub fn new(initial_timestamp: u64) -> Self {
        Self {
            initial_timestamp,
            ..Default::default()
        }
    }

    pub fn add_error_id(&mut self, id: impl Into<String>) {
        push_unique(&mut self.error_ids, id.into());
    }

    pub fn add_trace_id(&mut self, id: impl Into<String>) {
        push_unique(&mut self.trace_ids, id.into());
    }

    pub fn add_url(&mut self, url: impl Into<String>) {
        let url = url.into();
        if self.initial_url.is_none() {
            self.initial_url = Some(url.clone());
        }
        self.urls.push(url);
    }

    pub fn observe_event(&mut self, timestamp_ms: u64) {
        self.earliest_event = Some(match self.earliest_event {
            Some(earliest) => earliest.min(timestamp_ms),
            None => timestamp_ms,
        });
    }

    /// Copy taken when a segment is cut; the earliest event moves with it
    pub fn snapshot(&mut self) -> ReplayEventContext {
        let snapshot = self.clone();
        self.earliest_event = None;
        snapshot
    }

    /// Remove what `delivered` carried, keeping anything added since
    pub fn clear_delivered(&mut self, delivered: &ReplayEventContext) {
        self.error_ids.retain(|id| !delivered.error_ids.contains(id));
        self.trace_ids.retain(|id| !delivered.trace_ids.contains(id));

        // urls are append-only, so the delivered ones are a prefix
        let sent = delivered.urls.len().min(self.urls.len());
        if self.urls[..sent] == delivered.urls[..sent] {
            self.urls.drain(..sent);
        } else {
            self.urls.retain(|url| !delivered.urls.contains(url));
        }
    }

    /// Forget everything, e.g. on session rollover
    pub fn reset(&mut self, initial_timestamp: u64) {
        *self = Self::new(initial_timestamp);
    }
}

fn push_unique(ids: &mut Vec<String>, id: String) {
    if !ids.contains(&id) {
        ids.push(id);
    }
}
