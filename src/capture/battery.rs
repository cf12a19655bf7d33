use tokio::sync::watch;

/// Battery percent feed from the hosting environment. Hosts that expose no
/// battery signal simply never construct one, which disables battery-based
/// pausing entirely.
#[derive(Clone)]
pub struct BatteryFeed {
    tx: watch::Sender<f64>,
}

impl BatteryFeed {
    /// Starts the feed at `initial` percent.
    pub fn new(initial: f64) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    pub fn publish(&self, percent: f64) {
        let _ = self.tx.send(percent.clamp(0.0, 100.0));
    }

    pub fn subscribe(&self) -> watch::Receiver<f64> {
        self.tx.subscribe()
    }

    pub fn level(&self) -> f64 {
        *self.tx.borrow()
    }
}
