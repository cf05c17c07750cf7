//! 会话事件广播

use super::ScanStatus;
use crate::decode::DecodeResult;
use crate::error::ScanError;
use crossbeam_channel::{Receiver, Sender, TrySendError};
use std::sync::Mutex;

/// 控制器对外发出的事件
#[derive(Debug, Clone, PartialEq)]
pub enum ScanEvent {
    /// 状态变化
    StateChanged { from: ScanStatus, to: ScanStatus },
    /// 一次成功解码 (不去重, 每次命中都会发出)
    Decoded(DecodeResult),
    /// 会话失败, 每次失败只发一次
    Failed(ScanError),
}

/// 订阅者列表, 断开的订阅者在下一次广播时移除
///
/// 广播从不阻塞解码循环: 有界订阅者的队列满时, 这条事件对它丢弃.
#[derive(Default)]
pub(crate) struct EventBus {
    subscribers: Mutex<Vec<Sender<ScanEvent>>>,
}

impl EventBus {
    pub fn subscribe(&self) -> Receiver<ScanEvent> {
        self.register(crossbeam_channel::unbounded())
    }

    pub fn subscribe_bounded(&self, capacity: usize) -> Receiver<ScanEvent> {
        self.register(crossbeam_channel::bounded(capacity.max(1)))
    }

    fn register(&self, (tx, rx): (Sender<ScanEvent>, Receiver<ScanEvent>)) -> Receiver<ScanEvent> {
        if let Ok(mut subscribers) = self.subscribers.lock() {
            subscribers.push(tx);
        }
        rx
    }

    pub fn emit(&self, event: ScanEvent) {
        if let Ok(mut subscribers) = self.subscribers.lock() {
            subscribers.retain(|tx| match tx.try_send(event.clone()) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    tracing::trace!("订阅者队列已满, 丢弃事件");
                    true
                }
                Err(TrySendError::Disconnected(_)) => false,
            });
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.subscribers.lock().map(|s| s.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::BarcodeFormat;

    #[test]
    fn test_emit_reaches_every_subscriber() {
        let bus = EventBus::default();
        let a = bus.subscribe();
        let b = bus.subscribe();

        let event = ScanEvent::Decoded(DecodeResult::new("ABC123", BarcodeFormat::QrCode));
        bus.emit(event.clone());

        assert_eq!(a.try_recv().unwrap(), event);
        assert_eq!(b.try_recv().unwrap(), event);
    }

    #[test]
    fn test_dropped_subscriber_is_pruned() {
        let bus = EventBus::default();
        let keep = bus.subscribe();
        drop(bus.subscribe());

        bus.emit(ScanEvent::Failed(ScanError::NoDevicesAvailable));
        assert_eq!(bus.len(), 1);
        assert_eq!(
            keep.try_recv().unwrap(),
            ScanEvent::Failed(ScanError::NoDevicesAvailable)
        );
    }

    #[test]
    fn test_bounded_subscriber_drops_overflow() {
        let bus = EventBus::default();
        let slow = bus.subscribe_bounded(2);
        let fast = bus.subscribe();

        for i in 0..5 {
            let text = format!("code-{}", i);
            bus.emit(ScanEvent::Decoded(DecodeResult::new(text, BarcodeFormat::QrCode)));
        }

        // 慢订阅者只保留最早的两条, 仍然留在列表里
        assert_eq!(slow.try_iter().count(), 2);
        assert_eq!(fast.try_iter().count(), 5);
        assert_eq!(bus.len(), 2);

        bus.emit(ScanEvent::Failed(ScanError::NoDevicesAvailable));
        assert_eq!(
            slow.try_recv().unwrap(),
            ScanEvent::Failed(ScanError::NoDevicesAvailable)
        );
    }
}
