//! Cooperative interruption.
//!
//! The binary owns a [`ShutdownTrigger`] and fires it on Ctrl-C. The engines
//! hold the matching [`ShutdownSignal`]: they check it before each slide and
//! race it against the in-flight backend call, then return
//! [`crate::NotesError::Interrupted`]. Whatever was checkpointed before that
//! point stays on disk and the next run resumes from it.

use tokio::sync::watch;

/// Create a connected trigger/signal pair.
pub fn shutdown_channel() -> (ShutdownTrigger, ShutdownSignal) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx }, ShutdownSignal { rx: Some(rx) })
}

/// Sending half. Dropping it does not trigger shutdown.
#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

impl ShutdownTrigger {
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }
}

/// Receiving half, cheap to clone.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    rx: Option<watch::Receiver<bool>>,
}

impl ShutdownSignal {
    /// A signal that never fires, for library callers without Ctrl-C handling.
    pub fn never() -> Self {
        Self { rx: None }
    }

    pub fn is_triggered(&self) -> bool {
        self.rx.as_ref().map(|rx| *rx.borrow()).unwrap_or(false)
    }

    /// Resolve once shutdown is requested. Pends forever when the trigger
    /// was dropped without firing, or for [`ShutdownSignal::never`].
    pub async fn triggered(&self) {
        let Some(rx) = &self.rx else {
            return std::future::pending().await;
        };
        let mut rx = rx.clone();
        if rx.wait_for(|fired| *fired).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::never()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn trigger_wakes_waiters() {
        let (trigger, signal) = shutdown_channel();
        assert!(!signal.is_triggered());
        let waiter = {
            let signal = signal.clone();
            tokio::spawn(async move { signal.triggered().await })
        };
        trigger.trigger();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert!(signal.is_triggered());
    }

    #[tokio::test]
    async fn never_signal_stays_pending() {
        let signal = ShutdownSignal::never();
        assert!(!signal.is_triggered());
        let res = tokio::time::timeout(Duration::from_millis(20), signal.triggered()).await;
        assert!(res.is_err());
    }

    #[tokio::test]
    async fn dropped_trigger_does_not_fire() {
        let (trigger, signal) = shutdown_channel();
        drop(trigger);
        let res = tokio::time::timeout(Duration::from_millis(20), signal.triggered()).await;
        assert!(res.is_err());
        assert!(!signal.is_triggered());
    }
}
