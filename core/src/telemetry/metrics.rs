use std::sync::Mutex;

/// Kinds of remote requests the controller issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Analyze,
    Chunk,
    Recompute,
    Graph,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestCounters {
    pub issued: usize,
    pub applied: usize,
    /// Responses dropped because their generation was invalidated.
    pub stale: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub analyze: RequestCounters,
    pub chunk: RequestCounters,
    pub recompute: RequestCounters,
    pub graph: RequestCounters,
    /// Chunk requests issued but not yet resolved, across every viewer.
    pub outstanding_chunks: usize,
    pub peak_outstanding_chunks: usize,
}

impl MetricsSnapshot {
    pub fn counters(&self, kind: RequestKind) -> RequestCounters {
        match kind {
            RequestKind::Analyze => self.analyze,
            RequestKind::Chunk => self.chunk,
            RequestKind::Recompute => self.recompute,
            RequestKind::Graph => self.graph,
        }
    }
}

pub struct MetricsRecorder {
    inner: Mutex<MetricsSnapshot>,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MetricsSnapshot::default()),
        }
    }

    fn update(&self, kind: RequestKind, apply: impl FnOnce(&mut RequestCounters)) {
        if let Ok(mut metrics) = self.inner.lock() {
            let counters = match kind {
                RequestKind::Analyze => &mut metrics.analyze,
                RequestKind::Chunk => &mut metrics.chunk,
                RequestKind::Recompute => &mut metrics.recompute,
                RequestKind::Graph => &mut metrics.graph,
            };
            apply(counters);
        }
    }

    /// Every chunk issue must be matched by exactly one applied, stale or
    /// failed record; the outstanding count follows that pairing.
    fn track_chunks(&self, kind: RequestKind, issued: bool) {
        if kind != RequestKind::Chunk {
            return;
        }
        if let Ok(mut metrics) = self.inner.lock() {
            if issued {
                metrics.outstanding_chunks += 1;
                metrics.peak_outstanding_chunks = metrics
                    .peak_outstanding_chunks
                    .max(metrics.outstanding_chunks);
            } else {
                metrics.outstanding_chunks = metrics.outstanding_chunks.saturating_sub(1);
            }
        }
    }

    pub fn record_issued(&self, kind: RequestKind) {
        self.update(kind, |c| c.issued += 1);
        self.track_chunks(kind, true);
    }

    pub fn record_applied(&self, kind: RequestKind) {
        self.update(kind, |c| c.applied += 1);
        self.track_chunks(kind, false);
    }

    pub fn record_stale(&self, kind: RequestKind) {
        self.update(kind, |c| c.stale += 1);
        self.track_chunks(kind, false);
    }

    pub fn record_failed(&self, kind: RequestKind) {
        self.update(kind, |c| c.failed += 1);
        self.track_chunks(kind, false);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        if let Ok(metrics) = self.inner.lock() {
            *metrics
        } else {
            MetricsSnapshot::default()
        }
    }
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}
