// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::time::Duration;

pub const MIN_SEARCH_CHARS: usize = 3;
pub const DEFAULT_SEARCH_DEBOUNCE: Duration = Duration::from_millis(300);

/// Hands out request ids for scheduled searches and lookups. Ids are never 0
/// so a zeroed token can never match a live request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RequestIds {
    last: u64,
}

impl RequestIds {
    pub fn next(&mut self) -> u64 {
        self.last = self.last.saturating_add(1);
        if self.last == 0 {
            self.last = 1;
        }
        self.last
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermClass {
    Empty,
    TooShort,
    Searchable,
}

pub fn classify_term(term: &str) -> TermClass {
    match term.trim().chars().count() {
        0 => TermClass::Empty,
        n if n < MIN_SEARCH_CHARS => TermClass::TooShort,
        _ => TermClass::Searchable,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchAction {
    /// Term is empty; nothing searched yet.
    Idle,
    /// Term is 1-2 characters; results were cleared without a call.
    Cleared,
    /// Caller must wake the search with `fire(request_id)` once the debounce
    /// window elapses.
    Schedule { request_id: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchPhase {
    Idle,
    Pending { request_id: u64 },
    InFlight { request_id: u64 },
    Ready,
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveOutcome {
    Applied,
    Stale,
    Failed,
}

/// Debounced, search-gated result list. Every keystroke supersedes the
/// pending search; a result is applied only when its request id is still
/// the latest one issued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchState<T> {
    term: String,
    results: Vec<T>,
    phase: SearchPhase,
}

impl<T> Default for SearchState<T> {
    fn default() -> Self {
        Self {
            term: String::new(),
            results: Vec::new(),
            phase: SearchPhase::Idle,
        }
    }
}

impl<T> SearchState<T> {
    pub fn term(&self) -> &str {
        &self.term
    }

    pub fn results(&self) -> &[T] {
        &self.results
    }

    pub fn results_mut(&mut self) -> &mut Vec<T> {
        &mut self.results
    }

    pub fn phase(&self) -> &SearchPhase {
        &self.phase
    }

    pub fn is_loading(&self) -> bool {
        matches!(
            self.phase,
            SearchPhase::Pending { .. } | SearchPhase::InFlight { .. }
        )
    }

    pub fn error(&self) -> Option<&str> {
        match &self.phase {
            SearchPhase::Failed(message) => Some(message),
            _ => None,
        }
    }

    pub fn set_term(&mut self, term: impl Into<String>, ids: &mut RequestIds) -> SearchAction {
        self.term = term.into();
        match classify_term(&self.term) {
            TermClass::Empty => {
                self.results.clear();
                self.phase = SearchPhase::Idle;
                SearchAction::Idle
            }
            TermClass::TooShort => {
                self.results.clear();
                self.phase = SearchPhase::Idle;
                SearchAction::Cleared
            }
            TermClass::Searchable => {
                let request_id = ids.next();
                self.phase = SearchPhase::Pending { request_id };
                SearchAction::Schedule { request_id }
            }
        }
    }

    /// Debounce timer elapsed. Returns the trimmed term to search for when
    /// `request_id` is still the pending one.
    pub fn fire(&mut self, request_id: u64) -> Option<String> {
        match self.phase {
            SearchPhase::Pending { request_id: pending } if pending == request_id => {
                self.phase = SearchPhase::InFlight { request_id };
                Some(self.term.trim().to_owned())
            }
            _ => None,
        }
    }

    pub fn resolve(&mut self, request_id: u64, result: Result<Vec<T>, String>) -> ResolveOutcome {
        match self.phase {
            SearchPhase::InFlight {
                request_id: in_flight,
            } if in_flight == request_id => {}
            _ => return ResolveOutcome::Stale,
        }

        match result {
            Ok(results) => {
                self.results = results;
                self.phase = SearchPhase::Ready;
                ResolveOutcome::Applied
            }
            Err(message) => {
                self.results.clear();
                self.phase = SearchPhase::Failed(message);
                ResolveOutcome::Failed
            }
        }
    }

    /// Drops any pending or in-flight request so late replies are discarded.
    pub fn detach(&mut self) {
        if self.is_loading() {
            self.phase = SearchPhase::Idle;
        }
    }
}
