//! Cooperative cancellation and observable countdowns.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Operation cancelled")]
pub struct Cancelled;

/// Cloneable cancellation flag; every clone observes the same state.
#[derive(Clone, Debug)]
pub struct CancellationToken {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            tx: Arc::new(tx),
            rx,
        }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once `cancel` has been called on any clone.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        // The sender lives as long as `self`, so this only returns on cancel.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }

    pub fn checkpoint(&self) -> Result<(), Cancelled> {
        if self.is_cancelled() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// A timer that reports the remaining whole seconds once per tick.
#[derive(Debug, Clone, Copy)]
pub struct Countdown {
    tick: Duration,
}

impl Countdown {
    pub fn new(tick: Duration) -> Self {
        Self { tick }
    }

    /// Count down from `secs` to 1, calling `on_tick` before each tick.
    ///
    /// Returns `Err(Cancelled)` as soon as `cancel` fires; `secs == 0`
    /// completes immediately.
    pub async fn run<F>(
        &self,
        secs: u64,
        cancel: &CancellationToken,
        mut on_tick: F,
    ) -> Result<(), Cancelled>
    where
        F: FnMut(u64),
    {
        cancel.checkpoint()?;
        for remaining in (1..=secs).rev() {
            on_tick(remaining);
            tokio::select! {
                _ = tokio::time::sleep(self.tick) => {}
                _ = cancel.cancelled() => return Err(Cancelled),
            }
        }
        Ok(())
    }
}

impl Default for Countdown {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_counts_down_one_second_per_tick() {
        let token = CancellationToken::new();
        let start = Instant::now();
        let mut seen = Vec::new();
        Countdown::default()
            .run(3, &token, |s| seen.push(s))
            .await
            .unwrap();
        assert_eq!(seen, vec![3, 2, 1]);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(3) && elapsed < Duration::from_millis(3100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_is_immediate() {
        let token = CancellationToken::new();
        let mut ticks = 0;
        Countdown::default().run(0, &token, |_| ticks += 1).await.unwrap();
        assert_eq!(ticks, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_mid_countdown() {
        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(2500)).await;
            canceller.cancel();
        });
        let mut seen = Vec::new();
        let res = Countdown::default().run(10, &token, |s| seen.push(s)).await;
        assert_eq!(res, Err(Cancelled));
        assert_eq!(seen, vec![10, 9, 8]);
    }

    #[tokio::test]
    async fn test_already_cancelled() {
        let token = CancellationToken::new();
        token.cancel();
        assert!(token.is_cancelled());
        assert_eq!(token.checkpoint(), Err(Cancelled));
        let res = Countdown::default().run(5, &token, |_| {}).await;
        assert_eq!(res, Err(Cancelled));
    }
}
