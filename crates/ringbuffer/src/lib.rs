//! Bounded circular buffer for typed record hand-off between pipeline
//! stages (Component A).
//!
//! Producers and consumers register and own a cursor; cursors are not
//! `Sync` to enforce the single-thread-ownership contract — using one from
//! more than one thread concurrently is a contract violation the type
//! system cannot catch, so callers must not share a cursor.

use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Lifecycle state of a single slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotState {
    Empty,
    Writing,
    Ready,
    Reading,
    Processed,
}

/// What `publish` does when every slot is occupied.
#[derive(Clone, Copy, Debug)]
pub enum OverflowPolicy {
    /// Wait, per `WaitStrategy`, for a slot to free up.
    Block(WaitStrategy),
    /// Evict the oldest `Ready`/`Processed` slot and reuse it.
    OverwriteOldest,
    /// Return immediately without publishing.
    Drop,
}

/// How `Block` waits for a slot.
#[derive(Clone, Copy, Debug)]
pub enum WaitStrategy {
    /// Cooperative reschedule (`std::thread::yield_now`) between polls.
    Yield,
    /// A brief timed sleep between polls.
    Sleep(Duration),
    /// Block on a condition variable signalled by consumers/producers.
    Blocking,
}

/// Outcome of a `publish` call.
#[derive(Debug, PartialEq, Eq)]
pub enum PublishOutcome {
    Published(usize),
    /// The `Drop` policy discarded the payload; never reported as success.
    Dropped,
    /// `Block` gave up because the buffer was closed mid-wait.
    Cancelled,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RingBufferError {
    #[error("producer id '{0}' is already registered")]
    ProducerAlreadyRegistered(String),
    #[error("consumer id '{0}' is already registered")]
    ConsumerAlreadyRegistered(String),
    #[error("slot {0} is locked and cannot be reset")]
    SlotLocked(usize),
    #[error("cursor '{0}' is not registered")]
    UnknownCursor(String),
}

struct Slot<T> {
    state: SlotState,
    producer_id: Option<String>,
    consumer_id: Option<String>,
    sequence: u64,
    payload: Option<T>,
    locked: bool,
    last_transition: Instant,
}

impl<T> Slot<T> {
    fn empty() -> Self {
        Self {
            state: SlotState::Empty,
            producer_id: None,
            consumer_id: None,
            sequence: 0,
            payload: None,
            locked: false,
            last_transition: Instant::now(),
        }
    }
}

/// A producer's handle. Intentionally `!Sync` (via `PhantomData<*const ()>`)
/// since cursors must be owned by exactly one thread.
#[derive(Debug)]
pub struct ProducerCursor {
    pub id: String,
    position: usize,
    sequence: u64,
    last_active: Instant,
    _not_sync: PhantomData<*const ()>,
}

/// A consumer's handle; same single-thread-ownership contract as
/// `ProducerCursor`.
pub struct ConsumerCursor {
    pub id: String,
    position: usize,
    sequence: u64,
    last_active: Instant,
    _not_sync: PhantomData<*const ()>,
}

struct CursorLiveness {
    sequence: u64,
    last_active: Instant,
}

/// A bounded ring buffer of `T` payloads.
pub struct RingBuffer<T> {
    capacity: usize,
    slots: Mutex<Vec<Slot<T>>>,
    slot_ready: Condvar,
    producers: Mutex<HashMap<String, CursorLiveness>>,
    consumers: Mutex<HashMap<String, CursorLiveness>>,
    overflow_policy: OverflowPolicy,
    stalled_threshold: Duration,
    closed: Mutex<bool>,
}

/// An event raised by the background sweep or by slot-state transitions;
/// the runner forwards these to the metrics registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RingBufferEvent {
    CursorStalled { id: String },
    SlotStalled { index: usize },
}

impl<T> RingBuffer<T> {
    /// Construct a new ring buffer with `capacity` slots.
    pub fn new(capacity: usize, overflow_policy: OverflowPolicy, stalled_threshold: Duration) -> Self {
        assert!(capacity > 0, "ring buffer capacity must be positive");
        Self {
            capacity,
            slots: Mutex::new((0..capacity).map(|_| Slot::empty()).collect()),
            slot_ready: Condvar::new(),
            producers: Mutex::new(HashMap::new()),
            consumers: Mutex::new(HashMap::new()),
            overflow_policy,
            stalled_threshold,
            closed: Mutex::new(false),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Register a new producer. `id` defaults to a generated name if `None`.
    pub fn register_producer(&self, id: Option<String>) -> Result<ProducerCursor, RingBufferError> {
        let id = id.unwrap_or_else(|| format!("producer-{}", fastrand_like_id()));
        let mut producers = self.producers.lock();
        if producers.contains_key(&id) {
            return Err(RingBufferError::ProducerAlreadyRegistered(id));
        }
        producers.insert(
            id.clone(),
            CursorLiveness { sequence: 0, last_active: Instant::now() },
        );
        Ok(ProducerCursor {
            id,
            position: 0,
            sequence: 0,
            last_active: Instant::now(),
            _not_sync: PhantomData,
        })
    }

    /// Register a new consumer. `id` defaults to a generated name if `None`.
    pub fn register_consumer(&self, id: Option<String>) -> Result<ConsumerCursor, RingBufferError> {
        let id = id.unwrap_or_else(|| format!("consumer-{}", fastrand_like_id()));
        let mut consumers = self.consumers.lock();
        if consumers.contains_key(&id) {
            return Err(RingBufferError::ConsumerAlreadyRegistered(id));
        }
        consumers.insert(
            id.clone(),
            CursorLiveness { sequence: 0, last_active: Instant::now() },
        );
        Ok(ConsumerCursor {
            id,
            position: 0,
            sequence: 0,
            last_active: Instant::now(),
            _not_sync: PhantomData,
        })
    }

    /// Deregister a producer; does not corrupt other cursors' state.
    pub fn deregister_producer(&self, cursor: &ProducerCursor) {
        self.producers.lock().remove(&cursor.id);
    }

    /// Deregister a consumer; does not corrupt other cursors' state.
    pub fn deregister_consumer(&self, cursor: &ConsumerCursor) {
        self.consumers.lock().remove(&cursor.id);
    }

    fn find_empty_slot(slots: &[Slot<T>], start: usize) -> Option<usize> {
        (0..slots.len()).map(|i| (start + i) % slots.len()).find(|&i| slots[i].state == SlotState::Empty)
    }

    fn evict_oldest(slots: &mut [Slot<T>]) -> Option<usize> {
        slots
            .iter()
            .enumerate()
            .filter(|(_, s)| matches!(s.state, SlotState::Ready | SlotState::Processed) && !s.locked)
            .min_by_key(|(_, s)| s.sequence)
            .map(|(i, _)| i)
    }

    /// Publish a payload via `cursor`. See `OverflowPolicy` for what happens
    /// when no slot is immediately available.
    pub fn publish(&self, cursor: &mut ProducerCursor, payload: T) -> PublishOutcome {
        let deadline_policy = self.overflow_policy;
        loop {
            {
                let mut slots = self.slots.lock();
                let slot_idx = Self::find_empty_slot(&slots, cursor.position).or_else(|| {
                    if matches!(deadline_policy, OverflowPolicy::OverwriteOldest) {
                        Self::evict_oldest(&mut slots)
                    } else {
                        None
                    }
                });

                if let Some(idx) = slot_idx {
                    let slot = &mut slots[idx];
                    slot.state = SlotState::Writing;
                    slot.producer_id = Some(cursor.id.clone());
                    cursor.sequence += 1;
                    slot.sequence = cursor.sequence;
                    slot.payload = Some(payload);
                    slot.state = SlotState::Ready;
                    slot.last_transition = Instant::now();
                    cursor.position = (idx + 1) % self.capacity;
                    cursor.last_active = Instant::now();
                    self.touch_producer(cursor);
                    self.slot_ready.notify_all();
                    return PublishOutcome::Published(idx);
                }
            }

            match deadline_policy {
                OverflowPolicy::Drop => return PublishOutcome::Dropped,
                OverflowPolicy::OverwriteOldest => {
                    // no Ready/Processed slot to evict yet either; fall through to wait briefly
                    std::thread::yield_now();
                }
                OverflowPolicy::Block(strategy) => {
                    if *self.closed.lock() {
                        return PublishOutcome::Cancelled;
                    }
                    self.wait(strategy);
                    if *self.closed.lock() {
                        return PublishOutcome::Cancelled;
                    }
                }
            }
        }
    }

    /// Claim a `Ready` slot via `cursor`, returning `None` if none is ready.
    /// This call does not wait; callers implementing a wait budget should
    /// loop themselves using the same `WaitStrategy` vocabulary.
    pub fn consume(&self, cursor: &mut ConsumerCursor) -> Option<T> {
        let mut slots = self.slots.lock();
        let idx = cursor.position;
        if slots[idx].state != SlotState::Ready {
            return None;
        }
        let slot = &mut slots[idx];
        slot.state = SlotState::Reading;
        slot.consumer_id = Some(cursor.id.clone());
        let payload = slot.payload.take();
        slot.state = SlotState::Processed;
        slot.last_transition = Instant::now();
        cursor.sequence += 1;
        cursor.position = (idx + 1) % self.capacity;
        cursor.last_active = Instant::now();
        drop(slots);
        self.touch_consumer(cursor);
        payload
    }

    fn wait(&self, strategy: WaitStrategy) {
        match strategy {
            WaitStrategy::Yield => std::thread::yield_now(),
            WaitStrategy::Sleep(d) => std::thread::sleep(d),
            WaitStrategy::Blocking => {
                let mut slots = self.slots.lock();
                self.slot_ready.wait_for(&mut slots, Duration::from_millis(50));
            }
        }
    }

    fn touch_producer(&self, cursor: &ProducerCursor) {
        if let Some(entry) = self.producers.lock().get_mut(&cursor.id) {
            entry.sequence = cursor.sequence;
            entry.last_active = cursor.last_active;
        }
    }

    fn touch_consumer(&self, cursor: &ConsumerCursor) {
        if let Some(entry) = self.consumers.lock().get_mut(&cursor.id) {
            entry.sequence = cursor.sequence;
            entry.last_active = cursor.last_active;
        }
    }

    /// Reset a single slot to `Empty`, if it is not locked.
    pub fn reset_entry(&self, idx: usize) -> Result<(), RingBufferError> {
        let mut slots = self.slots.lock();
        if slots[idx].locked {
            return Err(RingBufferError::SlotLocked(idx));
        }
        slots[idx] = Slot::empty();
        Ok(())
    }

    /// Reset every non-locked slot to `Empty`.
    pub fn reset_all(&self) {
        let mut slots = self.slots.lock();
        for slot in slots.iter_mut() {
            if !slot.locked {
                *slot = Slot::empty();
            }
        }
    }

    /// Close the buffer: any `Block`-waiting `publish` call returns
    /// `Cancelled` instead of waiting further.
    pub fn close(&self) {
        *self.closed.lock() = true;
        self.slot_ready.notify_all();
    }

    /// Sweep for cursors and locked slots stalled beyond `stalled_threshold`,
    /// returning the observable events raised. Intended to be called
    /// periodically by the runner.
    pub fn sweep_stalled(&self) -> Vec<RingBufferEvent> {
        let mut events = Vec::new();
        let now = Instant::now();

        for (id, liveness) in self.producers.lock().iter() {
            if now.duration_since(liveness.last_active) > self.stalled_threshold {
                events.push(RingBufferEvent::CursorStalled { id: id.clone() });
            }
        }
        for (id, liveness) in self.consumers.lock().iter() {
            if now.duration_since(liveness.last_active) > self.stalled_threshold {
                events.push(RingBufferEvent::CursorStalled { id: id.clone() });
            }
        }
        for (idx, slot) in self.slots.lock().iter().enumerate() {
            if slot.locked && now.duration_since(slot.last_transition) > self.stalled_threshold {
                events.push(RingBufferEvent::SlotStalled { index: idx });
            }
        }

        events
    }
}

/// Small deterministic id generator so registering without an explicit id
/// doesn't require pulling in `rand` for this crate alone.
fn fastrand_like_id() -> u64 {
    use std::sync::atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    COUNTER.fetch_add(1, Ordering::Relaxed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buf(capacity: usize) -> RingBuffer<u32> {
        RingBuffer::new(capacity, OverflowPolicy::Drop, Duration::from_secs(30))
    }

    #[test]
    fn publish_then_consume_round_trips() {
        let rb = buf(4);
        let mut p = rb.register_producer(None).unwrap();
        let mut c = rb.register_consumer(None).unwrap();

        assert_eq!(rb.publish(&mut p, 42), PublishOutcome::Published(0));
        assert_eq!(rb.consume(&mut c), Some(42));
        assert_eq!(rb.consume(&mut c), None);
    }

    #[test]
    fn duplicate_producer_id_fails() {
        let rb = buf(4);
        rb.register_producer(Some("p1".into())).unwrap();
        let err = rb.register_producer(Some("p1".into())).unwrap_err();
        assert_eq!(err, RingBufferError::ProducerAlreadyRegistered("p1".into()));
    }

    #[test]
    fn drop_policy_drops_on_overflow() {
        let rb = buf(1);
        let mut p = rb.register_producer(None).unwrap();
        assert_eq!(rb.publish(&mut p, 1), PublishOutcome::Published(0));
        assert_eq!(rb.publish(&mut p, 2), PublishOutcome::Dropped);
    }

    #[test]
    fn overwrite_oldest_policy_reuses_ready_slot() {
        let rb: RingBuffer<u32> = RingBuffer::new(1, OverflowPolicy::OverwriteOldest, Duration::from_secs(30));
        let mut p = rb.register_producer(None).unwrap();
        let mut c = rb.register_consumer(None).unwrap();
        assert_eq!(rb.publish(&mut p, 1), PublishOutcome::Published(0));
        // slot 0 is Ready (not yet consumed) - overwrite should reclaim it
        assert_eq!(rb.publish(&mut p, 2), PublishOutcome::Published(0));
        assert_eq!(rb.consume(&mut c), Some(2));
    }

    #[test]
    fn deregistering_one_cursor_does_not_affect_another() {
        let rb = buf(4);
        let p1 = rb.register_producer(Some("p1".into())).unwrap();
        let _p2 = rb.register_producer(Some("p2".into())).unwrap();
        rb.deregister_producer(&p1);
        // p1's slot is free, re-registering under the same id now succeeds
        assert!(rb.register_producer(Some("p1".into())).is_ok());
        // p2 is untouched
        assert_eq!(
            rb.register_producer(Some("p2".into())).unwrap_err(),
            RingBufferError::ProducerAlreadyRegistered("p2".into())
        );
    }

    #[test]
    fn locked_slot_cannot_be_reset() {
        let rb = buf(2);
        rb.slots.lock()[0].locked = true;
        assert_eq!(rb.reset_entry(0), Err(RingBufferError::SlotLocked(0)));
        rb.slots.lock()[0].locked = false;
        assert!(rb.reset_entry(0).is_ok());
    }

    #[test]
    fn reset_all_skips_locked_slots() {
        let rb = buf(2);
        let mut p = rb.register_producer(None).unwrap();
        rb.publish(&mut p, 7);
        rb.slots.lock()[0].locked = true;
        rb.reset_all();
        assert_eq!(rb.slots.lock()[0].state, SlotState::Ready);
    }

    #[test]
    fn closing_cancels_a_blocked_publish() {
        let rb: RingBuffer<u32> = RingBuffer::new(1, OverflowPolicy::Block(WaitStrategy::Yield), Duration::from_secs(30));
        let mut p = rb.register_producer(None).unwrap();
        rb.publish(&mut p, 1);
        rb.close();
        assert_eq!(rb.publish(&mut p, 2), PublishOutcome::Cancelled);
    }

    #[test]
    fn sweep_reports_stalled_cursor() {
        let rb: RingBuffer<u32> = RingBuffer::new(2, OverflowPolicy::Drop, Duration::from_millis(1));
        let _p = rb.register_producer(Some("slow".into())).unwrap();
        std::thread::sleep(Duration::from_millis(5));
        let events = rb.sweep_stalled();
        assert!(events.contains(&RingBufferEvent::CursorStalled { id: "slow".into() }));
    }
}
