use std::collections::HashMap;

/// Minimum quiet period before the same symbol may alert again.
pub const COOLDOWN_SECS: u64 = 300;

/// Per-symbol cooldown bookkeeping, keyed purely by symbol.
///
/// In-memory only: a restart clears all cooldowns, so a symbol that alerted
/// just before shutdown may alert again right after startup.
#[derive(Debug, Default)]
pub struct AlertThrottle {
    last_notified: HashMap<String, u64>,
}

impl AlertThrottle {
    pub fn new() -> Self {
        Self::default()
    }

    /// True once more than [`COOLDOWN_SECS`] have passed since the last
    /// notification for `symbol`. Unseen symbols are always eligible.
    pub fn should_notify(&self, symbol: &str, now: u64) -> bool {
        let last = self.last_notified.get(symbol).copied().unwrap_or(0);
        now.saturating_sub(last) > COOLDOWN_SECS
    }

    pub fn mark_notified(&mut self, symbol: &str, now: u64) {
        self.last_notified.insert(symbol.to_string(), now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_sight_is_eligible() {
        let throttle = AlertThrottle::new();
        assert!(throttle.should_notify("AAAUSDT", 1_700_000_000));
    }

    #[test]
    fn cooldown_boundary() {
        let mut throttle = AlertThrottle::new();
        let t = 1_700_000_000;
        throttle.mark_notified("AAAUSDT", t);

        assert!(!throttle.should_notify("AAAUSDT", t + 299));
        assert!(!throttle.should_notify("AAAUSDT", t + 300));
        assert!(throttle.should_notify("AAAUSDT", t + 301));
    }

    #[test]
    fn symbols_do_not_interact() {
        let mut throttle = AlertThrottle::new();
        throttle.mark_notified("AAAUSDT", 1_700_000_000);
        assert!(throttle.should_notify("BBBUSDT", 1_700_000_001));
    }
}
