//! Nonce issuance for signed actions
//!
//! Hyperliquid keeps the 100 highest nonces per signer and only accepts
//! values inside `(T - 2 days, T + 1 day)`. The manager mirrors that: it issues
//! strictly increasing UTC-millisecond nonces and remembers the last 100 it
//! issued or observed.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds per day
pub const MS_PER_DAY: u64 = 86_400_000;

/// Capacity of the recent-nonce window
pub const RECENT_NONCE_CAPACITY: usize = 100;

/// Wall-clock source in UTC milliseconds
pub type Clock = Arc<dyn Fn() -> u64 + Send + Sync>;

/// Current UTC time in milliseconds
pub fn current_time_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

struct NonceState {
    last: u64,
    recent: VecDeque<u64>,
}

impl NonceState {
    fn push(&mut self, nonce: u64) {
        if self.recent.len() == RECENT_NONCE_CAPACITY {
            self.recent.pop_front();
        }
        self.recent.push_back(nonce);
    }
}

/// Issues strictly increasing nonces; shared by every caller that signs
pub struct NonceManager {
    clock: Clock,
    state: Mutex<NonceState>,
}

impl NonceManager {
    /// Manager backed by the system clock
    pub fn new() -> Self {
        Self::with_clock(Arc::new(current_time_ms))
    }

    /// Manager backed by a custom clock
    pub fn with_clock(clock: Clock) -> Self {
        Self {
            clock,
            state: Mutex::new(NonceState {
                last: 0,
                recent: VecDeque::with_capacity(RECENT_NONCE_CAPACITY),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, NonceState> {
        // The state stays consistent even if a holder panicked mid-push
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Current time according to this manager's clock
    pub fn now_ms(&self) -> u64 {
        (self.clock)()
    }

    /// Issue the next nonce: `max(now, last + 1)`
    ///
    /// `last` only ever holds issued nonces or values that passed the
    /// validity window, so it stays far below `u64::MAX`.
    pub fn next(&self) -> u64 {
        let mut state = self.lock();
        let now = self.now_ms();
        let nonce = match state.last.checked_add(1) {
            Some(after_last) => now.max(after_last),
            None => u64::MAX,
        };
        state.last = nonce;
        state.push(nonce);
        nonce
    }

    /// Absorb a nonce that originated elsewhere
    ///
    /// Values outside the validity window are refused (`false`) and leave
    /// the manager untouched.
    pub fn record(&self, nonce: u64) -> bool {
        if !self.within_valid_window(nonce) {
            return false;
        }
        let mut state = self.lock();
        state.last = state.last.max(nonce);
        state.push(nonce);
        true
    }

    /// Record `nonce` unless it is already remembered or outside the
    /// validity window; `false` in either case
    pub fn claim(&self, nonce: u64) -> bool {
        if !self.within_valid_window(nonce) {
            return false;
        }
        let mut state = self.lock();
        if state.recent.contains(&nonce) {
            return false;
        }
        state.last = state.last.max(nonce);
        state.push(nonce);
        true
    }

    /// Whether the exchange would accept `nonce` right now
    pub fn within_valid_window(&self, nonce: u64) -> bool {
        let now = self.now_ms();
        let lower = now.saturating_sub(2 * MS_PER_DAY);
        let upper = now.saturating_add(MS_PER_DAY);
        lower < nonce && nonce < upper
    }

    /// Whether `nonce` is among the last 100 issued or observed
    pub fn seen(&self, nonce: u64) -> bool {
        self.lock().recent.contains(&nonce)
    }

    /// Highest nonce issued or observed so far
    pub fn last(&self) -> u64 {
        self.lock().last
    }

    /// Number of nonces currently remembered
    pub fn window_len(&self) -> usize {
        self.lock().recent.len()
    }
}

impl Default for NonceManager {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for NonceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("NonceManager")
            .field("last", &state.last)
            .field("window_len", &state.recent.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn fixed_clock(ms: u64) -> (Clock, Arc<AtomicU64>) {
        let now = Arc::new(AtomicU64::new(ms));
        let handle = Arc::clone(&now);
        (Arc::new(move || handle.load(Ordering::SeqCst)), now)
    }

    #[test]
    fn test_next_follows_clock_when_it_advances() {
        let (clock, now) = fixed_clock(1_700_000_000_000);
        let nonces = NonceManager::with_clock(clock);

        assert_eq!(nonces.next(), 1_700_000_000_000);
        now.store(1_700_000_000_500, Ordering::SeqCst);
        assert_eq!(nonces.next(), 1_700_000_000_500);
    }

    #[test]
    fn test_next_strictly_increasing_with_stalled_clock() {
        let (clock, _) = fixed_clock(1_700_000_000_000);
        let nonces = NonceManager::with_clock(clock);

        let issued: Vec<u64> = (0..5).map(|_| nonces.next()).collect();
        assert_eq!(
            issued,
            vec![
                1_700_000_000_000,
                1_700_000_000_001,
                1_700_000_000_002,
                1_700_000_000_003,
                1_700_000_000_004
            ]
        );
    }

    #[test]
    fn test_next_strictly_increasing_with_regressing_clock() {
        let (clock, now) = fixed_clock(1_700_000_010_000);
        let nonces = NonceManager::with_clock(clock);

        let first = nonces.next();
        now.store(1_700_000_000_000, Ordering::SeqCst);
        let second = nonces.next();
        assert_eq!(second, first + 1);
    }

    #[test]
    fn test_record_advances_last() {
        let (clock, _) = fixed_clock(1_000);
        let nonces = NonceManager::with_clock(clock);

        assert!(nonces.record(5_000));
        assert_eq!(nonces.last(), 5_000);
        assert!(nonces.seen(5_000));
        assert_eq!(nonces.next(), 5_001);

        // A lower external nonce is remembered but does not move `last` back
        assert!(nonces.record(10));
        assert_eq!(nonces.last(), 5_001);
        assert!(nonces.seen(10));
    }

    #[test]
    fn test_claim_rejects_duplicates() {
        let (clock, _) = fixed_clock(1_000);
        let nonces = NonceManager::with_clock(clock);

        assert!(nonces.claim(2_000));
        assert!(!nonces.claim(2_000));
        assert_eq!(nonces.last(), 2_000);
        assert_eq!(nonces.window_len(), 1);
    }

    #[test]
    fn test_record_refuses_out_of_window_values() {
        let (clock, _) = fixed_clock(1_700_000_000_000);
        let nonces = NonceManager::with_clock(clock);

        assert!(!nonces.record(u64::MAX));
        assert!(!nonces.record(1_700_000_000_000 + 2 * MS_PER_DAY));
        assert!(!nonces.claim(u64::MAX));
        assert_eq!(nonces.last(), 0);
        assert_eq!(nonces.window_len(), 0);

        let first = nonces.next();
        assert_eq!(first, 1_700_000_000_000);
        assert!(nonces.next() > first);
    }

    #[test]
    fn test_window_evicts_oldest_after_capacity() {
        let (clock, _) = fixed_clock(1_700_000_000_000);
        let nonces = NonceManager::with_clock(clock);

        let first = nonces.next();
        for _ in 0..100 {
            nonces.next();
        }

        assert_eq!(nonces.window_len(), RECENT_NONCE_CAPACITY);
        assert!(!nonces.seen(first));
        assert!(nonces.seen(first + 1));
        assert!(nonces.seen(first + 100));
    }

    #[test]
    fn test_valid_window_bounds() {
        let nonces = NonceManager::new();
        let now = nonces.now_ms();

        assert!(nonces.within_valid_window(now));
        assert!(!nonces.within_valid_window(now - 3 * MS_PER_DAY));
        assert!(!nonces.within_valid_window(now + 2 * MS_PER_DAY));
    }

    #[test]
    fn test_valid_window_is_exclusive() {
        let (clock, _) = fixed_clock(10 * MS_PER_DAY);
        let nonces = NonceManager::with_clock(clock);

        assert!(!nonces.within_valid_window(8 * MS_PER_DAY));
        assert!(nonces.within_valid_window(8 * MS_PER_DAY + 1));
        assert!(!nonces.within_valid_window(11 * MS_PER_DAY));
        assert!(nonces.within_valid_window(11 * MS_PER_DAY - 1));
    }

    #[test]
    fn test_concurrent_next_never_duplicates() {
        let (clock, _) = fixed_clock(1_700_000_000_000);
        let nonces = Arc::new(NonceManager::with_clock(clock));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let nonces = Arc::clone(&nonces);
                std::thread::spawn(move || (0..250).map(|_| nonces.next()).collect::<Vec<_>>())
            })
            .collect();

        let mut all: Vec<u64> = handles
            .into_iter()
            .flat_map(|h| h.join().expect("thread panicked"))
            .collect();
        let total = all.len();
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), total);
        assert_eq!(nonces.last(), 1_700_000_000_000 + total as u64 - 1);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_next_strictly_increasing(clock_steps in proptest::collection::vec(-5_000i64..5_000, 1..200)) {
                let (clock, now) = fixed_clock(1_700_000_000_000);
                let nonces = NonceManager::with_clock(clock);

                let mut previous = 0u64;
                for step in clock_steps {
                    let current = now.load(Ordering::SeqCst) as i64 + step;
                    now.store(current as u64, Ordering::SeqCst);
                    let nonce = nonces.next();
                    prop_assert!(nonce > previous);
                    previous = nonce;
                }
                prop_assert!(nonces.window_len() <= RECENT_NONCE_CAPACITY);
            }
        }
    }
}
