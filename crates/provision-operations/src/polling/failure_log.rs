use provision_core::{FailureLogEntry, MarkerPair};

/// Extracts the lines describing a failed attempt from a provider event log.
///
/// Logs are read newest entry first. A failed attempt is closed by an entry
/// containing the end marker and opened by an older entry containing the
/// start marker; the entries in between explain the failure.
#[derive(Debug, Clone, Copy)]
pub struct FailureLogCollector<'a> {
    markers: &'a MarkerPair,
}

impl<'a> FailureLogCollector<'a> {
    #[must_use]
    pub fn new(markers: &'a MarkerPair) -> Self {
        Self { markers }
    }

    /// Returns the window of the most recent failed attempt.
    ///
    /// Returns `None` if the log holds no end marker. Without an older start
    /// marker the window runs to the end of the log.
    #[must_use]
    pub fn find(&self, entries: &[FailureLogEntry]) -> Option<Vec<String>> {
        let end = entries.iter().position(|entry| self.is_end(entry))?;
        Some(self.window_after(entries, end))
    }

    /// Like [`find`](Self::find), but yields nothing when no failure is recorded.
    #[must_use]
    pub fn extract(&self, entries: &[FailureLogEntry]) -> Vec<String> {
        self.find(entries).unwrap_or_default()
    }

    /// Returns the failure window only if the latest attempt is the one that failed.
    ///
    /// An end marker that is older than the newest start marker belongs to an
    /// earlier attempt and is ignored.
    #[must_use]
    pub fn latest_attempt_failure(&self, entries: &[FailureLogEntry]) -> Option<Vec<String>> {
        let first = entries
            .iter()
            .position(|entry| self.is_end(entry) || self.is_start(entry))?;
        if self.is_end(&entries[first]) {
            Some(self.window_after(entries, first))
        } else {
            None
        }
    }

    fn window_after(&self, entries: &[FailureLogEntry], end: usize) -> Vec<String> {
        entries[end + 1..]
            .iter()
            .take_while(|entry| !self.is_start(entry))
            .map(ToString::to_string)
            .collect()
    }

    fn is_start(&self, entry: &FailureLogEntry) -> bool {
        entry.message.contains(&self.markers.start)
    }

    fn is_end(&self, entry: &FailureLogEntry) -> bool {
        entry.message.contains(&self.markers.end)
    }
}
