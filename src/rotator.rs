use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{anyhow, Result};

/// Round-robin over the feed access tokens. Call [`TokenRotator::next`] once
/// per feed request, right before issuing it.
#[derive(Debug)]
pub struct TokenRotator {
    tokens: Vec<String>,
    calls: AtomicUsize,
}

impl TokenRotator {
    pub fn new(tokens: Vec<String>) -> Result<Self> {
        if tokens.is_empty() {
            return Err(anyhow!("token pool must not be empty"));
        }
        Ok(Self {
            tokens,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn next(&self) -> &str {
        let idx = self.calls.fetch_add(1, Ordering::Relaxed) % self.tokens.len();
        &self.tokens[idx]
    }

    /// Number of tokens handed out so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_round_robin() {
        let rotator = TokenRotator::new(vec!["a".into(), "b".into(), "c".into()]).unwrap();
        let seen: Vec<String> = (0..7).map(|_| rotator.next().to_string()).collect();
        assert_eq!(seen, vec!["a", "b", "c", "a", "b", "c", "a"]);
        assert_eq!(rotator.calls(), 7);
    }

    #[test]
    fn single_token_pool_repeats() {
        let rotator = TokenRotator::new(vec!["only".into()]).unwrap();
        assert_eq!(rotator.next(), "only");
        assert_eq!(rotator.next(), "only");
    }

    #[test]
    fn empty_pool_rejected() {
        assert!(TokenRotator::new(Vec::new()).is_err());
    }
}
