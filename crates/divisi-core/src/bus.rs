//! Bounded single-producer/single-consumer message queues.
//!
//! One queue per direction connects the control thread and the audio thread.
//! Every message travels inside a [`Message`] carrying the protocol version
//! and a per-queue sequence number, so the receiver can verify in-order,
//! exactly-once delivery.
//!
//! Storage is a `ringbuf` heap ring allocated once in [`channel`]. Push and pop
//! never block and never allocate. The producer publishes a slot with a release
//! store of the write index and the consumer observes it with an acquire load,
//! so a message's fields are fully visible once it is popped.
//!
//! Overflow policy is chosen per send:
//! - [`Sender::send`] rejects and hands the message back (commands).
//! - [`Sender::send_or_drop`] drops the newest message and bumps a shared
//!   counter (informational notifications).

use ringbuf::{traits::*, HeapCons, HeapProd, HeapRb};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Wire protocol version stamped on every message.
pub const PROTOCOL_VERSION: u16 = 1;

/// A message plus its delivery metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message<T> {
    pub version: u16,
    pub seq: u64,
    pub body: T,
}

impl<T> Message<T> {
    /// Reject messages produced by a different protocol revision.
    pub fn check_version(&self) -> crate::Result<()> {
        if self.version != PROTOCOL_VERSION {
            return Err(crate::Error::VersionMismatch {
                expected: PROTOCOL_VERSION,
                found: self.version,
            });
        }
        Ok(())
    }
}

/// Returned by [`Sender::send`] when the queue is full. Holds the rejected message.
#[derive(Debug, PartialEq)]
pub struct Full<T>(pub T);

#[derive(Debug, Default)]
struct Counters {
    dropped: AtomicU64,
}

/// Producer half.
pub struct Sender<T> {
    producer: HeapProd<Message<T>>,
    next_seq: u64,
    counters: Arc<Counters>,
}

impl<T> Sender<T> {
    /// Enqueue `body`, or give it back if the queue is full.
    ///
    /// Returns the sequence number assigned to the message.
    #[inline]
    pub fn send(&mut self, body: T) -> Result<u64, Full<T>> {
        let seq = self.next_seq;
        let message = Message {
            version: PROTOCOL_VERSION,
            seq,
            body,
        };
        match self.producer.try_push(message) {
            Ok(()) => {
                self.next_seq += 1;
                Ok(seq)
            }
            Err(rejected) => Err(Full(rejected.body)),
        }
    }

    /// Enqueue `body`, dropping it if the queue is full.
    ///
    /// Returns false when the message was dropped. The rejected value is
    /// dropped in the caller's thread.
    #[inline]
    pub fn send_or_drop(&mut self, body: T) -> bool {
        match self.send(body) {
            Ok(_) => true,
            Err(Full(_)) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.producer.is_full()
    }

    #[inline]
    pub fn vacant_len(&self) -> usize {
        self.producer.vacant_len()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.producer.capacity().get()
    }

    /// Messages dropped by [`send_or_drop`](Sender::send_or_drop) so far.
    pub fn dropped(&self) -> u64 {
        self.counters.dropped.load(Ordering::Relaxed)
    }
}

/// Consumer half.
pub struct Receiver<T> {
    consumer: HeapCons<Message<T>>,
    expected_seq: u64,
    counters: Arc<Counters>,
}

impl<T> Receiver<T> {
    /// Pop the next message.
    #[inline]
    pub fn recv_message(&mut self) -> Option<Message<T>> {
        let message = self.consumer.try_pop()?;
        debug_assert_eq!(message.version, PROTOCOL_VERSION);
        debug_assert_eq!(message.seq, self.expected_seq, "out-of-order delivery");
        self.expected_seq = message.seq + 1;
        Some(message)
    }

    /// Pop the next message body.
    #[inline]
    pub fn recv(&mut self) -> Option<T> {
        self.recv_message().map(|message| message.body)
    }

    /// Pop everything currently queued.
    pub fn drain(&mut self) -> Vec<T> {
        let mut out = Vec::with_capacity(self.consumer.occupied_len());
        while let Some(body) = self.recv() {
            out.push(body);
        }
        out
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.consumer.occupied_len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.consumer.is_empty()
    }

    /// Sequence number the next message will carry.
    #[inline]
    pub fn expected_seq(&self) -> u64 {
        self.expected_seq
    }

    /// Messages the producer dropped on overflow.
    pub fn dropped(&self) -> u64 {
        self.counters.dropped.load(Ordering::Relaxed)
    }
}

/// Create a queue holding at most `capacity` messages.
pub fn channel<T>(capacity: usize) -> (Sender<T>, Receiver<T>) {
    let rb = HeapRb::new(capacity.max(1));
    let (producer, consumer) = rb.split();
    let counters = Arc::new(Counters::default());
    (
        Sender {
            producer,
            next_seq: 0,
            counters: Arc::clone(&counters),
        },
        Receiver {
            consumer,
            expected_seq: 0,
            counters,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    enum Edit {
        Gain(f32),
        Select(u32),
    }

    #[test]
    fn test_send_and_recv_in_order() {
        let (mut tx, mut rx) = channel(8);
        assert_eq!(tx.send(Edit::Gain(0.5)), Ok(0));
        assert_eq!(tx.send(Edit::Select(3)), Ok(1));

        let first = rx.recv_message().unwrap();
        assert_eq!(first.seq, 0);
        assert_eq!(first.version, PROTOCOL_VERSION);
        assert_eq!(first.body, Edit::Gain(0.5));
        assert_eq!(rx.recv(), Some(Edit::Select(3)));
        assert_eq!(rx.recv(), None);
        assert_eq!(rx.expected_seq(), 2);
    }

    #[test]
    fn test_reject_hands_message_back() {
        let (mut tx, mut rx) = channel(2);
        tx.send(Edit::Select(0)).unwrap();
        tx.send(Edit::Select(1)).unwrap();
        assert!(tx.is_full());

        let rejected = tx.send(Edit::Select(2));
        assert_eq!(rejected, Err(Full(Edit::Select(2))));
        assert_eq!(tx.dropped(), 0);

        // The rejected message did not consume a sequence number.
        rx.recv();
        assert_eq!(tx.send(Edit::Select(2)), Ok(2));
        assert_eq!(rx.drain(), vec![Edit::Select(1), Edit::Select(2)]);
    }

    #[test]
    fn test_drop_newest_counts() {
        let (mut tx, mut rx) = channel(2);
        assert!(tx.send_or_drop(Edit::Select(0)));
        assert!(tx.send_or_drop(Edit::Select(1)));
        assert!(!tx.send_or_drop(Edit::Select(2)));
        assert!(!tx.send_or_drop(Edit::Select(3)));

        assert_eq!(rx.dropped(), 2);
        assert_eq!(rx.drain(), vec![Edit::Select(0), Edit::Select(1)]);
    }

    #[test]
    fn test_capacity_and_len() {
        let (mut tx, rx) = channel::<Edit>(4);
        assert_eq!(tx.capacity(), 4);
        assert!(rx.is_empty());
        tx.send(Edit::Gain(1.0)).unwrap();
        assert_eq!(rx.len(), 1);
        assert_eq!(tx.vacant_len(), 3);
    }

    #[test]
    fn test_message_serde_round_trip() {
        let message = Message {
            version: PROTOCOL_VERSION,
            seq: 41,
            body: Edit::Gain(-3.0),
        };
        let json = serde_json::to_string(&message).unwrap();
        let back: Message<Edit> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, message);
        assert!(back.check_version().is_ok());

        let stale = Message {
            version: PROTOCOL_VERSION + 1,
            ..back
        };
        assert!(matches!(
            stale.check_version(),
            Err(crate::Error::VersionMismatch { .. })
        ));
    }

    #[test]
    fn test_cross_thread_fifo() {
        let (mut tx, mut rx) = channel(64);
        let producer = std::thread::spawn(move || {
            let mut i = 0u32;
            while i < 10_000 {
                if tx.send(Edit::Select(i)).is_ok() {
                    i += 1;
                } else {
                    std::thread::yield_now();
                }
            }
        });

        let mut next = 0u32;
        while next < 10_000 {
            match rx.recv() {
                Some(Edit::Select(v)) => {
                    assert_eq!(v, next);
                    next += 1;
                }
                Some(other) => panic!("unexpected {:?}", other),
                None => std::thread::yield_now(),
            }
        }
        producer.join().unwrap();
        assert!(rx.is_empty());
    }

    proptest! {
        #[test]
        fn prop_fifo_with_drop_counting(
            capacity in 1usize..16,
            ops in prop::collection::vec(any::<bool>(), 1..200),
        ) {
            // true sends one message, false drains one.
            let (mut tx, mut rx) = channel(capacity);
            let mut accepted = Vec::new();
            let mut received = Vec::new();
            let mut dropped = 0u64;
            for (i, send) in ops.into_iter().enumerate() {
                if send {
                    let was_full = tx.is_full();
                    let sent = tx.send_or_drop(Edit::Select(i as u32));
                    prop_assert_eq!(sent, !was_full);
                    if sent {
                        accepted.push(Edit::Select(i as u32));
                    } else {
                        dropped += 1;
                    }
                } else if let Some(edit) = rx.recv() {
                    received.push(edit);
                }
                prop_assert!(rx.len() <= capacity);
            }
            received.extend(rx.drain());
            prop_assert_eq!(received, accepted);
            prop_assert_eq!(rx.dropped(), dropped);
            prop_assert_eq!(tx.dropped(), dropped);
        }
    }
}
