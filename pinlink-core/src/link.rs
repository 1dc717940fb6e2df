//! Restricted-context inbox. Radio callbacks copy into a fixed buffer and enqueue; every
//! table mutation and every send happens later, in `Node::update`.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use heapless::mpmc::MpMcQueue;

use crate::ids::LinkAddress;
use crate::wire::MAX_FRAME_LEN;

/// Events buffered between two `update` calls. Must be a power of two.
pub const INBOX_CAPACITY: usize = 32;

/// Raw frame bytes as they came off the radio.
pub type FrameBuf = heapless::Vec<u8, MAX_FRAME_LEN>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent<A> {
    Received { from: A, bytes: FrameBuf },
    DeliveryStatus { to: A, success: bool },
}

struct Inbox<A> {
    queue: MpMcQueue<LinkEvent<A>, INBOX_CAPACITY>,
    dropped: AtomicU32,
}

/// Handle the transport calls from its receive and delivery-status callbacks.
/// Bound to exactly one `Node`; clone it freely. Never blocks or allocates.
pub struct LinkHandle<A> {
    inbox: Arc<Inbox<A>>,
}

impl<A> Clone for LinkHandle<A> {
    fn clone(&self) -> Self {
        Self {
            inbox: Arc::clone(&self.inbox),
        }
    }
}

impl<A: LinkAddress> LinkHandle<A> {
    pub(crate) fn new() -> Self {
        Self {
            inbox: Arc::new(Inbox {
                queue: MpMcQueue::new(),
                dropped: AtomicU32::new(0),
            }),
        }
    }

    /// A datagram arrived from `from`. Returns false if it was dropped (oversized or inbox full).
    pub fn on_receive(&self, from: A, bytes: &[u8]) -> bool {
        let Ok(bytes) = FrameBuf::from_slice(bytes) else {
            self.inbox.dropped.fetch_add(1, Ordering::Relaxed);
            return false;
        };
        self.push(LinkEvent::Received { from, bytes })
    }

    /// The radio finished a unicast or broadcast send to `to`.
    pub fn on_delivery_status(&self, to: A, success: bool) -> bool {
        self.push(LinkEvent::DeliveryStatus { to, success })
    }

    /// Events lost to a full inbox or an oversized datagram since creation.
    pub fn dropped(&self) -> u32 {
        self.inbox.dropped.load(Ordering::Relaxed)
    }

    pub(crate) fn pop(&self) -> Option<LinkEvent<A>> {
        self.inbox.queue.dequeue()
    }

    fn push(&self, event: LinkEvent<A>) -> bool {
        if self.inbox.queue.enqueue(event).is_err() {
            self.inbox.dropped.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::MacAddress;

    fn mac(n: u8) -> MacAddress {
        MacAddress([2, 0, 0, 0, 0, n])
    }

    #[test]
    fn events_come_out_in_order() {
        let h = LinkHandle::new();
        assert!(h.on_receive(mac(1), b"abc"));
        assert!(h.on_delivery_status(mac(2), false));
        match h.pop() {
            Some(LinkEvent::Received { from, bytes }) => {
                assert_eq!(from, mac(1));
                assert_eq!(&bytes[..], b"abc");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(
            h.pop(),
            Some(LinkEvent::DeliveryStatus {
                to: mac(2),
                success: false
            })
        );
        assert_eq!(h.pop(), None);
    }

    #[test]
    fn full_inbox_drops_and_reports() {
        let h = LinkHandle::new();
        for _ in 0..INBOX_CAPACITY {
            assert!(h.on_delivery_status(mac(1), true));
        }
        assert!(!h.on_delivery_status(mac(1), true));
        assert_eq!(h.dropped(), 1);
        assert!(h.pop().is_some());
        assert!(h.on_delivery_status(mac(1), true));
    }

    #[test]
    fn oversized_datagram_dropped() {
        let h = LinkHandle::new();
        assert!(!h.on_receive(mac(1), &[0u8; MAX_FRAME_LEN + 1]));
        assert_eq!(h.dropped(), 1);
        assert_eq!(h.pop(), None);
    }

    #[test]
    fn clones_share_one_inbox_across_threads() {
        let h: LinkHandle<MacAddress> = LinkHandle::new();
        let producer = h.clone();
        std::thread::spawn(move || {
            for n in 0..8 {
                producer.on_receive(mac(n), &[n]);
            }
        })
        .join()
        .unwrap();
        let mut seen = 0;
        while h.pop().is_some() {
            seen += 1;
        }
        assert_eq!(seen, 8);
    }
}
