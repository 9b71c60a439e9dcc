//! Shared device-control session
//!
//! One [`Session`] exists per process. The refresher is the only writer;
//! every API call reads the access token from it. Both tokens are swapped
//! under a single write lock so a reader never sees a mixed pair, and the
//! lock is never held across an await point.

use super::types::TokenPair;
use std::sync::{Arc, PoisonError, RwLock};

#[derive(Debug, Clone, Default)]
pub struct Session {
    tokens: Arc<RwLock<TokenPair>>,
}

impl Session {
    pub fn new(tokens: TokenPair) -> Self {
        Self {
            tokens: Arc::new(RwLock::new(tokens)),
        }
    }

    /// Snapshot of the current token pair
    pub fn tokens(&self) -> TokenPair {
        self.tokens
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn access_token(&self) -> String {
        self.tokens
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .access_token
            .clone()
    }

    pub fn refresh_token(&self) -> String {
        self.tokens
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .refresh_token
            .clone()
    }

    /// Atomically replace both tokens
    pub fn replace(&self, tokens: TokenPair) {
        *self.tokens.write().unwrap_or_else(PoisonError::into_inner) = tokens;
    }

    pub fn is_authenticated(&self) -> bool {
        !self
            .tokens
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .access_token
            .is_empty()
    }
}
