use serde::Serialize;
use std::time::Duration;
use tokio::sync::watch;

/// Event that schedules a render pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Trigger {
    /// The document finished loading (once per page view).
    Ready,
    /// Client-side navigation replaced the document content.
    Navigated,
    /// The root display-mode attribute changed (debounced).
    DisplayModeChanged,
    /// Explicit re-render request.
    Manual,
}

impl Trigger {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::Navigated => "navigated",
            Self::DisplayModeChanged => "display-mode-changed",
            Self::Manual => "manual",
        }
    }
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Waits for the next change on `rx`, then keeps absorbing changes until `window` passes without
/// one. Returns the settled value, or `None` once the sender is gone.
pub async fn next_settled<T: Clone>(rx: &mut watch::Receiver<T>, window: Duration) -> Option<T> {
    rx.changed().await.ok()?;
    loop {
        tokio::select! {
            changed = rx.changed() => changed.ok()?,
            () = tokio::time::sleep(window) => break,
        }
    }
    Some(rx.borrow_and_update().clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn bursts_collapse_into_one_settled_value() {
        let (tx, mut rx) = watch::channel(0u32);
        let window = Duration::from_millis(100);

        let waiter = tokio::spawn(async move {
            let first = next_settled(&mut rx, window).await;
            (first, rx)
        });

        for v in 1..=3 {
            tx.send_replace(v);
            tokio::time::sleep(Duration::from_millis(30)).await;
        }

        let (first, mut rx) = waiter.await.unwrap();
        assert_eq!(first, Some(3));
        assert!(!rx.has_changed().unwrap());

        drop(tx);
        assert_eq!(next_settled(&mut rx, window).await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn sender_dropped_mid_window_ends_the_wait() {
        let (tx, mut rx) = watch::channel('a');
        tx.send_replace('b');
        let wait = next_settled(&mut rx, Duration::from_millis(50));
        drop(tx);
        assert_eq!(wait.await, None);
    }
}
