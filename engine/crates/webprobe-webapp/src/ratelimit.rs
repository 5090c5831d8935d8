//! Per-client request pacing

use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use webprobe_core::ProbeError;

/// Spaces out requests issued through one client.
///
/// Each caller reserves the next free start slot under a lock and then sleeps
/// outside it, so concurrent checks sharing a client are throttled together
/// and starts are never closer than `delay`. Completing a request pushes the
/// next slot to at least `completion + delay`.
#[derive(Debug)]
pub struct RateLimiter {
    delay: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            next_slot: Mutex::new(None),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Wait for this caller's slot, or fail if the token is cancelled first
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<(), ProbeError> {
        if cancel.is_cancelled() {
            return Err(ProbeError::Cancelled);
        }
        if self.delay.is_zero() {
            return Ok(());
        }

        let now = Instant::now();
        let slot = {
            let mut next = self.next_slot.lock().unwrap_or_else(|p| p.into_inner());
            let slot = match *next {
                Some(t) if t > now => t,
                _ => now,
            };
            *next = Some(slot + self.delay);
            slot
        };

        if slot > now {
            tokio::select! {
                _ = cancel.cancelled() => return Err(ProbeError::Cancelled),
                _ = tokio::time::sleep_until(slot) => {}
            }
        }
        Ok(())
    }

    /// Record that a request finished
    pub fn complete(&self) {
        if self.delay.is_zero() {
            return;
        }
        let earliest = Instant::now() + self.delay;
        let mut next = self.next_slot.lock().unwrap_or_else(|p| p.into_inner());
        match *next {
            Some(t) if t >= earliest => {}
            _ => *next = Some(earliest),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_sequential_spacing() {
        let limiter = RateLimiter::new(Duration::from_millis(40));
        let cancel = CancellationToken::new();
        let start = std::time::Instant::now();

        for _ in 0..4 {
            limiter.acquire(&cancel).await.unwrap();
            limiter.complete();
        }

        assert!(start.elapsed() >= Duration::from_millis(120));
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_budget() {
        let limiter = Arc::new(RateLimiter::new(Duration::from_millis(30)));
        let cancel = CancellationToken::new();
        let start = std::time::Instant::now();

        let handles: Vec<_> = (0..5)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                let cancel = cancel.clone();
                tokio::spawn(async move { limiter.acquire(&cancel).await })
            })
            .collect();
        for h in handles {
            h.await.unwrap().unwrap();
        }

        assert!(start.elapsed() >= Duration::from_millis(120));
    }

    #[tokio::test]
    async fn test_zero_delay_is_immediate() {
        let limiter = RateLimiter::new(Duration::ZERO);
        let cancel = CancellationToken::new();
        for _ in 0..100 {
            limiter.acquire(&cancel).await.unwrap();
            limiter.complete();
        }
    }

    #[tokio::test]
    async fn test_cancel_interrupts_wait() {
        let limiter = RateLimiter::new(Duration::from_secs(30));
        let cancel = CancellationToken::new();
        limiter.acquire(&cancel).await.unwrap();

        let waiter = {
            let cancel = cancel.clone();
            tokio::spawn(async move { limiter.acquire(&cancel).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();

        let result = tokio::time::timeout(Duration::from_secs(2), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result, Err(ProbeError::Cancelled));
    }
}
