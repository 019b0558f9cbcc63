//! Single-flight token refresh
//!
//! When several requests hit 401 at once only the first one (the leader) calls
//! the refresh endpoint. The others queue behind it and all receive the
//! leader's outcome. Phases: `Idle -> Refreshing -> (Idle | Failed)`; a later
//! 401 may start a new cycle from either end state.

use std::future::Future;
use std::sync::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};
use crate::{Result, StorefrontError};

type Outcome = std::result::Result<String, String>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshPhase { Idle, Refreshing, Failed }

#[derive(Default)]
enum Phase {
    #[default]
    Idle,
    Refreshing(Vec<oneshot::Sender<Outcome>>),
    Failed,
}

enum Ticket {
    /// A newer token is already in place; replay with it.
    Ready(String),
    Leader,
    Follower(oneshot::Receiver<Outcome>),
}

#[derive(Default)]
pub struct TokenRefresher {
    phase: Mutex<Phase>,
}

impl TokenRefresher {
    pub fn new() -> Self { Self::default() }

    pub fn phase(&self) -> RefreshPhase {
        match &*self.lock() {
            Phase::Idle => RefreshPhase::Idle,
            Phase::Refreshing(_) => RefreshPhase::Refreshing,
            Phase::Failed => RefreshPhase::Failed,
        }
    }

    /// Obtains a token to replay a request that was rejected while carrying
    /// `used`. `current` reads the stored token; `refresh` runs the exchange
    /// and must store the new token before resolving.
    pub async fn recover<C, F, Fut>(&self, used: Option<&str>, current: C, refresh: F) -> Result<String>
    where
        C: FnOnce() -> Option<String>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String>>,
    {
        match self.enter(used, current) {
            Ticket::Ready(token) => {
                debug!("token already refreshed by another request");
                Ok(token)
            }
            Ticket::Follower(rx) => {
                debug!("refresh in flight, queueing request");
                match rx.await {
                    Ok(Ok(token)) => Ok(token),
                    Ok(Err(reason)) => {
                        debug!(%reason, "queued request rejected after failed refresh");
                        Err(StorefrontError::Unauthorized)
                    }
                    Err(_) => Err(StorefrontError::Unauthorized),
                }
            }
            Ticket::Leader => {
                let mut guard = LeaderGuard { refresher: self, done: false };
                info!("access token rejected, refreshing");
                let outcome = refresh().await;
                guard.done = true;
                match &outcome {
                    Ok(token) => self.finish(Ok(token.clone())),
                    Err(e) => self.finish(Err(e.to_string())),
                }
                outcome
            }
        }
    }

    fn enter<C: FnOnce() -> Option<String>>(&self, used: Option<&str>, current: C) -> Ticket {
        let mut phase = self.lock();
        if let Phase::Refreshing(queue) = &mut *phase {
            let (tx, rx) = oneshot::channel();
            queue.push(tx);
            return Ticket::Follower(rx);
        }
        // Checked under the lock so a refresh that finished just before cannot be repeated.
        if let Some(token) = current().filter(|t| Some(t.as_str()) != used) {
            return Ticket::Ready(token);
        }
        *phase = Phase::Refreshing(Vec::new());
        Ticket::Leader
    }

    fn finish(&self, outcome: Outcome) {
        let queue = {
            let mut phase = self.lock();
            let next = if outcome.is_ok() { Phase::Idle } else { Phase::Failed };
            match std::mem::replace(&mut *phase, next) {
                Phase::Refreshing(queue) => queue,
                _ => Vec::new(),
            }
        };
        match &outcome {
            Ok(_) => info!(queued = queue.len(), "token refreshed, replaying queued requests"),
            Err(reason) => warn!(queued = queue.len(), %reason, "token refresh failed, rejecting queued requests"),
        }
        for tx in queue {
            let _ = tx.send(outcome.clone());
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Phase> {
        self.phase.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Releases queued requests if the leader's future is dropped mid-refresh.
struct LeaderGuard<'a> {
    refresher: &'a TokenRefresher,
    done: bool,
}

impl Drop for LeaderGuard<'_> {
    fn drop(&mut self) {
        if !self.done {
            self.refresher.finish(Err("refresh cancelled".to_string()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    const FRESH: &str = "fresh-token-0123456789abcdef";

    #[tokio::test]
    async fn test_concurrent_callers_share_one_refresh() {
        let refresher = Arc::new(TokenRefresher::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let stored: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(Some("stale".into())));

        let tasks = (0..6).map(|_| {
            let refresher = refresher.clone();
            let calls = calls.clone();
            let stored = stored.clone();
            tokio::spawn(async move {
                let read = stored.clone();
                refresher
                    .recover(Some("stale"), move || read.lock().unwrap().clone(), || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(30)).await;
                        *stored.lock().unwrap() = Some(FRESH.to_string());
                        Ok(FRESH.to_string())
                    })
                    .await
            })
        });

        for task in futures::future::join_all(tasks).await {
            assert_eq!(task.unwrap().unwrap(), FRESH);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(refresher.phase(), RefreshPhase::Idle);
    }

    #[tokio::test]
    async fn test_failure_rejects_and_marks_failed() {
        let refresher = TokenRefresher::new();
        let result = refresher
            .recover(Some("stale"), || None, || async { Err(StorefrontError::Unauthorized) })
            .await;
        assert!(matches!(result, Err(StorefrontError::Unauthorized)));
        assert_eq!(refresher.phase(), RefreshPhase::Failed);
    }

    #[tokio::test]
    async fn test_newer_token_skips_refresh() {
        let refresher = TokenRefresher::new();
        let token = refresher
            .recover(Some("stale"), || Some(FRESH.to_string()), || async {
                Err(StorefrontError::Config("refresh should not run".into()))
            })
            .await
            .unwrap();
        assert_eq!(token, FRESH);
    }
}
