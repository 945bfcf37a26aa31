//! Single-flight and stale-response discipline for chapter fetches.
//!
//! Every request carries the generation it was issued under. A completion
//! whose generation no longer matches is inert: it must not touch the
//! content list and must not clear flags that now belong to a newer
//! generation. Flags reset only when the generation advances.

use crate::chapter::ChapterKey;
use tracing::debug;

/// Which guarded path a request went through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchKind {
    Initial,
    Successor,
}

/// Captured at issue time and handed back on completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestToken {
    pub generation: u64,
    pub kind: FetchKind,
    pub key: ChapterKey,
}

/// Per-generation fetch flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchGuard {
    pub initial_fetch_issued: bool,
    pub next_fetch_in_flight: bool,
}

/// Outcome of matching a completed request against the current generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Current,
    Stale,
}

#[derive(Debug, Default)]
pub struct RequestGuard {
    generation: u64,
    flags: FetchGuard,
}

impl RequestGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn flags(&self) -> FetchGuard {
        self.flags
    }

    /// Start a new generation, invalidating every request issued before.
    pub fn advance_generation(&mut self) -> u64 {
        self.generation = self.generation.wrapping_add(1);
        self.flags = FetchGuard::default();
        self.generation
    }

    /// Issue the first fetch of the generation, at most once.
    pub fn try_begin_initial(&mut self, key: &ChapterKey) -> Option<RequestToken> {
        if self.flags.initial_fetch_issued {
            debug!(
                generation = self.generation,
                chapter = %key,
                "Initial fetch already issued for this generation"
            );
            return None;
        }
        self.flags.initial_fetch_issued = true;
        Some(RequestToken {
            generation: self.generation,
            kind: FetchKind::Initial,
            key: key.clone(),
        })
    }

    /// Issue a successor fetch unless one is already in flight.
    pub fn try_begin_successor(&mut self, key: &ChapterKey) -> Option<RequestToken> {
        if self.flags.next_fetch_in_flight {
            debug!(
                generation = self.generation,
                chapter = %key,
                "Successor fetch already in flight"
            );
            return None;
        }
        self.flags.next_fetch_in_flight = true;
        Some(RequestToken {
            generation: self.generation,
            kind: FetchKind::Successor,
            key: key.clone(),
        })
    }

    /// Settle a completed request. Stale tokens leave the flags untouched.
    pub fn complete(&mut self, token: &RequestToken) -> Completion {
        if token.generation != self.generation {
            return Completion::Stale;
        }
        if token.kind == FetchKind::Successor {
            self.flags.next_fetch_in_flight = false;
        }
        Completion::Current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(n: u32) -> ChapterKey {
        ChapterKey::new("novel-42", n)
    }

    #[test]
    fn initial_fetch_is_issued_once_per_generation() {
        let mut guard = RequestGuard::new();
        guard.advance_generation();

        let issued: Vec<_> = (0..5)
            .filter_map(|_| guard.try_begin_initial(&key(5)))
            .collect();

        assert_eq!(issued.len(), 1);
        assert_eq!(issued[0].generation, 1);
        assert_eq!(issued[0].kind, FetchKind::Initial);
        assert!(guard.flags().initial_fetch_issued);
    }

    #[test]
    fn completing_the_initial_fetch_keeps_it_issued() {
        let mut guard = RequestGuard::new();
        guard.advance_generation();
        let token = guard.try_begin_initial(&key(5)).unwrap();

        assert_eq!(guard.complete(&token), Completion::Current);
        assert!(guard.try_begin_initial(&key(5)).is_none());
    }

    #[test]
    fn successor_fetches_are_single_flight() {
        let mut guard = RequestGuard::new();
        guard.advance_generation();

        let first = guard.try_begin_successor(&key(6)).unwrap();
        assert!(guard.try_begin_successor(&key(6)).is_none());
        assert!(guard.try_begin_successor(&key(6)).is_none());

        assert_eq!(guard.complete(&first), Completion::Current);
        assert!(!guard.flags().next_fetch_in_flight);
        assert!(guard.try_begin_successor(&key(7)).is_some());
    }

    #[test]
    fn stale_completion_does_not_clear_new_generation_flags() {
        let mut guard = RequestGuard::new();
        guard.advance_generation();
        let old = guard.try_begin_successor(&key(6)).unwrap();

        guard.advance_generation();
        let current = guard.try_begin_successor(&key(2)).unwrap();

        assert_eq!(guard.complete(&old), Completion::Stale);
        assert!(guard.flags().next_fetch_in_flight);
        assert_eq!(guard.complete(&current), Completion::Current);
        assert!(!guard.flags().next_fetch_in_flight);
    }

    #[test]
    fn advancing_generation_resets_both_flags() {
        let mut guard = RequestGuard::new();
        guard.advance_generation();
        guard.try_begin_initial(&key(1));
        guard.try_begin_successor(&key(2));

        let generation = guard.advance_generation();

        assert_eq!(generation, 2);
        assert_eq!(guard.flags(), FetchGuard::default());
    }
}
