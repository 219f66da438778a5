use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

/// A stop signal shared between background workers. Every clone observes the same trigger,
/// including clones made after it was fired.
pub struct Shutdown {
    triggered: Arc<AtomicBool>,
    sender: broadcast::Sender<()>,
    receiver: broadcast::Receiver<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (sender, receiver) = broadcast::channel(1);
        Self {
            triggered: Arc::new(AtomicBool::new(false)),
            sender,
            receiver,
        }
    }

    pub fn trigger(&self) {
        self.triggered.store(true, Ordering::SeqCst);
        let _ = self.sender.send(());
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    pub async fn recv(&mut self) {
        if self.is_triggered() {
            return;
        }
        let _ = self.receiver.recv().await;
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for Shutdown {
    fn clone(&self) -> Self {
        Self {
            triggered: self.triggered.clone(),
            sender: self.sender.clone(),
            receiver: self.sender.subscribe(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn late_clones_still_see_the_trigger() {
        let shutdown = Shutdown::new();
        shutdown.trigger();

        let mut late = shutdown.clone();
        assert!(late.is_triggered());
        timeout(Duration::from_secs(1), late.recv()).await.unwrap();
    }

    #[tokio::test]
    async fn waiting_clones_wake() {
        let shutdown = Shutdown::new();
        let mut waiting = shutdown.clone();
        let task = tokio::spawn(async move { waiting.recv().await });

        shutdown.trigger();
        timeout(Duration::from_secs(1), task).await.unwrap().unwrap();
    }
}
