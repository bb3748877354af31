use tokio::sync::oneshot;

/// Create a linked one-shot cancellation pair.
pub fn cancellation() -> (CancellationSource, CancellationSignal) {
    let (tx, rx) = oneshot::channel();
    (
        CancellationSource { tx },
        CancellationSignal { rx: Some(rx) },
    )
}

/// Caller side: fires the cancellation at most once (consumed by `cancel`).
#[derive(Debug)]
pub struct CancellationSource {
    tx: oneshot::Sender<()>,
}

impl CancellationSource {
    pub fn cancel(self) {
        // Receiver already gone means the operation settled; nothing to cancel.
        let _ = self.tx.send(());
    }
}

/// Listener side, owned by the poll loop.
#[derive(Debug)]
pub struct CancellationSignal {
    rx: Option<oneshot::Receiver<()>>,
}

impl CancellationSignal {
    /// A signal that never fires.
    pub fn never() -> Self {
        Self { rx: None }
    }

    /// Resolves once, when the source fires. After that, or if the source was
    /// dropped without firing, it stays pending forever.
    pub async fn cancelled(&mut self) {
        if let Some(rx) = self.rx.as_mut() {
            let fired = rx.await.is_ok();
            self.rx = None;
            if fired {
                return;
            }
        }
        std::future::pending::<()>().await
    }
}
