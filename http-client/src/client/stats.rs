use std::fmt;

/// Progress counters of one logical request.
///
/// The per-hop counter starts at zero, meaning "no retries yet", and is
/// reset whenever a redirect switches the target, so a freshly redirected
/// hop gets the full retry budget again.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RetryStats {
    retried_total: usize,
    retried_on_current_hop: usize,
    redirected: usize,
}

impl RetryStats {
    #[inline]
    pub fn new() -> Self {
        Default::default()
    }

    /// Records one retry on the current hop.
    pub(super) fn increase_retried(&mut self) {
        self.retried_total += 1;
        self.retried_on_current_hop += 1;
    }

    /// Records one followed redirect and resets the per-hop counter.
    pub(super) fn switch_hop(&mut self) {
        self.redirected += 1;
        self.retried_on_current_hop = 0;
    }

    /// Retries across all hops.
    #[inline]
    pub fn retried_total(&self) -> usize {
        self.retried_total
    }

    /// Retries on the hop currently being attempted.
    #[inline]
    pub fn retried_on_current_hop(&self) -> usize {
        self.retried_on_current_hop
    }

    /// Redirects followed so far.
    #[inline]
    pub fn redirected(&self) -> usize {
        self.redirected
    }

    /// Submissions made on the current hop, the first one included.
    #[inline]
    pub fn attempts(&self) -> usize {
        self.retried_on_current_hop + 1
    }
}

impl fmt::Display for RetryStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.retried_total, self.retried_on_current_hop, self.redirected
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_stats_mean_first_attempt() {
        let stats = RetryStats::new();
        assert_eq!(stats.retried_total(), 0);
        assert_eq!(stats.attempts(), 1);
    }

    #[test]
    fn test_switch_hop_resets_per_hop_counter_only() {
        let mut stats = RetryStats::new();
        stats.increase_retried();
        stats.increase_retried();
        assert_eq!(stats.attempts(), 3);

        stats.switch_hop();
        assert_eq!(stats.retried_total(), 2);
        assert_eq!(stats.retried_on_current_hop(), 0);
        assert_eq!(stats.redirected(), 1);
        assert_eq!(stats.attempts(), 1);
        assert_eq!(stats.to_string(), "2/0/1");
    }
}
