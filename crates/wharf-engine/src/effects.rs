use tokio::sync::broadcast;
use tracing::debug;
use wharf_common::protocol::Effect;

/// Receives side effects (notifications, badge changes) decided by the core.
///
/// The core never performs them itself; the hosting surface does.
pub trait EffectSink: Send + Sync {
    fn emit(&self, effect: Effect);
}

/// Discards every effect.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EffectSink for NullSink {
    fn emit(&self, _effect: Effect) {}
}

/// Fans effects out to every subscribed surface.
#[derive(Debug, Clone)]
pub struct BroadcastSink {
    tx: broadcast::Sender<Effect>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Effect> {
        self.tx.subscribe()
    }
}

impl EffectSink for BroadcastSink {
    fn emit(&self, effect: Effect) {
        // No subscribers just means no surface is open right now.
        if self.tx.send(effect).is_err() {
            debug!("Dropped effect: no surface connected");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wharf_common::protocol::BadgeState;

    #[tokio::test]
    async fn test_broadcast_reaches_subscribers() {
        let sink = BroadcastSink::new(8);
        let mut rx = sink.subscribe();
        sink.emit(Effect::Badge(BadgeState::from_count(2)));
        assert_eq!(
            rx.recv().await.unwrap(),
            Effect::Badge(BadgeState::from_count(2))
        );
    }

    #[test]
    fn test_broadcast_without_subscribers_is_silent() {
        BroadcastSink::new(8).emit(Effect::OpenOptionsPage);
    }
}
