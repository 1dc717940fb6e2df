//! Outstanding-message tracker: a fixed pool of in-flight frames awaiting confirmation,
//! with retry scheduling and timeouts.
//!
//! Entries are confirmed by an application acknowledgement, a pin-read response, or a
//! positive link-layer delivery status. Failures (negative delivery status, ack timeout)
//! consume retries for retryable kinds; everything else settles on its first failure.
//! Every entry settles at most once, so a caller is told the outcome exactly once.

use std::fmt;
use std::time::Duration;

use tracing::{debug, trace};

use crate::config::CoreConfig;
use crate::ids::{BoardId, MessageId};
use crate::protocol::{Body, MessageKind};
use crate::time::Timestamp;

/// Final result of a confirmable pin-control send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinControlOutcome {
    pub target: BoardId,
    pub pin: u8,
    pub value: u8,
    pub success: bool,
}

/// Final result of a remote pin read. `value` is meaningful only when `success`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinReadOutcome {
    pub target: BoardId,
    pub pin: u8,
    pub value: u8,
    pub success: bool,
}

pub type PinControlCallback = Box<dyn FnOnce(PinControlOutcome) + Send>;
pub type PinReadCallback = Box<dyn FnOnce(PinReadOutcome) + Send>;

/// What a tracked entry is waiting for, and who to tell. The callback type is tied
/// to the message kind, so a read callback can never be handed a pin-control result.
pub enum Confirmation {
    PinControl {
        pin: u8,
        value: u8,
        callback: Option<PinControlCallback>,
    },
    PinRead {
        pin: u8,
        callback: Option<PinReadCallback>,
    },
    /// Any other unicast frame tracked only because acknowledgements are on.
    Plain,
}

impl Confirmation {
    fn has_callback(&self) -> bool {
        match self {
            Confirmation::PinControl { callback, .. } => callback.is_some(),
            Confirmation::PinRead { callback, .. } => callback.is_some(),
            Confirmation::Plain => false,
        }
    }

    fn pin_context(&self) -> (Option<u8>, Option<u8>) {
        match self {
            Confirmation::PinControl { pin, value, .. } => (Some(*pin), Some(*value)),
            Confirmation::PinRead { pin, .. } => (Some(*pin), None),
            Confirmation::Plain => (None, None),
        }
    }
}

impl fmt::Debug for Confirmation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Confirmation::PinControl { pin, value, callback } => f
                .debug_struct("PinControl")
                .field("pin", pin)
                .field("value", value)
                .field("callback", &callback.is_some())
                .finish(),
            Confirmation::PinRead { pin, callback } => f
                .debug_struct("PinRead")
                .field("pin", pin)
                .field("callback", &callback.is_some())
                .finish(),
            Confirmation::Plain => f.write_str("Plain"),
        }
    }
}

/// One in-flight frame.
#[derive(Debug)]
pub struct TrackedMessage {
    pub message_id: MessageId,
    pub target: BoardId,
    /// Resent verbatim (same message id) on retry.
    pub body: Body,
    /// Time of the latest send attempt.
    pub sent_at: Timestamp,
    pub acknowledged: bool,
    pub retry_count: u8,
    pub next_retry_at: Timestamp,
    pub retry_pending: bool,
    pub confirmation: Confirmation,
}

impl TrackedMessage {
    pub fn new(
        message_id: MessageId,
        target: BoardId,
        body: Body,
        confirmation: Confirmation,
        now: Timestamp,
    ) -> Self {
        Self {
            message_id,
            target,
            body,
            sent_at: now,
            acknowledged: false,
            retry_count: 0,
            next_retry_at: now,
            retry_pending: false,
            confirmation,
        }
    }

    pub fn kind(&self) -> MessageKind {
        self.body.kind()
    }

    /// Still able to succeed or fail on a link-layer event.
    pub fn awaiting_link_status(&self) -> bool {
        !self.acknowledged && !self.retry_pending
    }
}

/// Why an entry settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettleReason {
    Acknowledged,
    Delivered,
    Responded,
    TimedOut,
    LinkFailure,
    RetriesExhausted,
    SendRefused,
}

enum Notifier {
    PinControl(PinControlCallback, PinControlOutcome),
    PinRead(PinReadCallback, PinReadOutcome),
}

/// A settled entry, carrying the caller's callback (if any) ready to fire.
pub struct Settlement {
    pub message_id: MessageId,
    pub target: BoardId,
    pub kind: MessageKind,
    pub success: bool,
    pub reason: SettleReason,
    pub pin: Option<u8>,
    pub value: Option<u8>,
    notifier: Option<Notifier>,
}

impl Settlement {
    pub fn has_callback(&self) -> bool {
        self.notifier.is_some()
    }

    /// Run the caller's completion callback. Returns true if one ran.
    pub fn notify(self) -> bool {
        match self.notifier {
            Some(Notifier::PinControl(cb, outcome)) => {
                cb(outcome);
                true
            }
            Some(Notifier::PinRead(cb, outcome)) => {
                cb(outcome);
                true
            }
            None => false,
        }
    }
}

impl fmt::Debug for Settlement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settlement")
            .field("message_id", &self.message_id)
            .field("target", &self.target)
            .field("kind", &self.kind)
            .field("success", &self.success)
            .field("reason", &self.reason)
            .field("has_callback", &self.has_callback())
            .finish()
    }
}

/// Retry and timeout knobs, snapshotted from `CoreConfig` on every tick.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub auto_retry: bool,
    pub max_retries: u8,
    pub retry_delay: Duration,
    pub ack_timeout: Duration,
    pub ack_grace: Duration,
}

impl From<&CoreConfig> for RetryPolicy {
    fn from(c: &CoreConfig) -> Self {
        Self {
            auto_retry: c.auto_retry,
            max_retries: c.max_retries,
            retry_delay: c.retry_delay(),
            ack_timeout: c.ack_timeout(),
            ack_grace: c.ack_grace(),
        }
    }
}

/// Result of a failed attempt.
#[derive(Debug)]
pub enum FailureOutcome {
    RetryScheduled { retry: u8, at: Timestamp },
    Settled(Settlement),
    /// Entry stays as is (plain entries wait for their timeout).
    Ignored,
}

/// What a tick produced.
#[derive(Debug, Default)]
pub struct TickReport {
    pub settled: Vec<Settlement>,
    pub resent: Vec<MessageId>,
    /// Plain entries that timed out without a callback; reported to failure hooks.
    pub expired: Vec<(BoardId, MessageKind)>,
}

pub struct MessageTracker {
    slots: Vec<Option<TrackedMessage>>,
}

impl MessageTracker {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: (0..capacity).map(|_| None).collect(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.slots.iter().all(Option::is_some)
    }

    /// Take the first free slot. Hands the entry back when the pool is full or the id
    /// is already in flight.
    pub fn track(&mut self, entry: TrackedMessage) -> Result<usize, TrackedMessage> {
        if self.find(entry.message_id).is_some() {
            return Err(entry);
        }
        match self.slots.iter().position(Option::is_none) {
            Some(slot) => {
                trace!(id = %entry.message_id, slot, board = %entry.target, "tracking");
                self.slots[slot] = Some(entry);
                Ok(slot)
            }
            None => Err(entry),
        }
    }

    pub fn find(&self, message_id: MessageId) -> Option<usize> {
        self.slots
            .iter()
            .position(|s| matches!(s, Some(m) if m.message_id == message_id))
    }

    pub fn get(&self, slot: usize) -> Option<&TrackedMessage> {
        self.slots.get(slot).and_then(Option::as_ref)
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &TrackedMessage)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|m| (i, m)))
    }

    /// Release a slot without notifying anyone. Used when the first send never left.
    pub fn discard(&mut self, slot: usize) -> Option<TrackedMessage> {
        self.slots.get_mut(slot).and_then(Option::take)
    }

    /// Drop every pin-control callback. Retries and timeouts carry on.
    pub fn clear_pin_control_callbacks(&mut self) -> usize {
        let mut cleared = 0;
        for entry in self.slots.iter_mut().flatten() {
            if let Confirmation::PinControl { callback, .. } = &mut entry.confirmation {
                if callback.take().is_some() {
                    cleared += 1;
                }
            }
        }
        cleared
    }

    /// Application ack for `ack_id` from `sender`. Duplicates and strangers are ignored.
    pub fn acknowledge(
        &mut self,
        ack_id: MessageId,
        sender: &BoardId,
    ) -> Option<Settlement> {
        let slot = self.find(ack_id)?;
        let entry = self.slots[slot].as_mut()?;
        if entry.target != *sender {
            debug!(id = %ack_id, from = %sender, expected = %entry.target, "ack from wrong board ignored");
            return None;
        }
        if entry.acknowledged {
            trace!(id = %ack_id, "duplicate ack absorbed");
            return None;
        }
        if matches!(entry.confirmation, Confirmation::PinRead { .. }) {
            // A read is confirmed by its response, not by the ack of the request.
            return None;
        }
        debug!(id = %ack_id, from = %sender, "acknowledged");
        self.settle(slot, true, SettleReason::Acknowledged, None)
    }

    /// Pin-read response for request `request_id`.
    pub fn complete_read(
        &mut self,
        request_id: MessageId,
        sender: &BoardId,
        value: u8,
        success: bool,
    ) -> Option<Settlement> {
        let slot = self.find(request_id)?;
        let entry = self.slots[slot].as_ref()?;
        if entry.target != *sender
            || entry.acknowledged
            || !matches!(entry.confirmation, Confirmation::PinRead { .. })
        {
            return None;
        }
        self.settle(slot, success, SettleReason::Responded, Some(value))
    }

    /// Link-layer delivery status for the entry in `slot` (chosen by the correlator).
    pub fn on_link_status(
        &mut self,
        slot: usize,
        success: bool,
        now: Timestamp,
        policy: &RetryPolicy,
    ) -> FailureOutcome {
        let Some(entry) = self.slots.get_mut(slot).and_then(Option::as_mut) else {
            return FailureOutcome::Ignored;
        };
        if !entry.awaiting_link_status() {
            return FailureOutcome::Ignored;
        }
        let plain = matches!(entry.confirmation, Confirmation::Plain);
        let read = matches!(entry.confirmation, Confirmation::PinRead { .. });
        if success {
            if plain {
                entry.acknowledged = true;
                return FailureOutcome::Ignored;
            }
            // Reads wait for the response frame.
            if read {
                return FailureOutcome::Ignored;
            }
            return self
                .settle(slot, true, SettleReason::Delivered, None)
                .map_or(FailureOutcome::Ignored, FailureOutcome::Settled);
        }
        if plain {
            return FailureOutcome::Ignored;
        }
        self.fail(slot, SettleReason::LinkFailure, now, policy)
    }

    /// Record a failed attempt: schedule a retry if allowed, otherwise settle as failed.
    pub fn fail(
        &mut self,
        slot: usize,
        reason: SettleReason,
        now: Timestamp,
        policy: &RetryPolicy,
    ) -> FailureOutcome {
        let Some(entry) = self.slots.get_mut(slot).and_then(Option::as_mut) else {
            return FailureOutcome::Ignored;
        };
        if entry.kind().is_retryable()
            && policy.auto_retry
            && entry.retry_count < policy.max_retries
        {
            entry.retry_count += 1;
            entry.retry_pending = true;
            entry.next_retry_at = now + policy.retry_delay;
            debug!(
                id = %entry.message_id,
                retry = entry.retry_count,
                max = policy.max_retries,
                ?reason,
                "retry scheduled"
            );
            return FailureOutcome::RetryScheduled {
                retry: entry.retry_count,
                at: entry.next_retry_at,
            };
        }
        let reason = if entry.retry_count > 0 {
            SettleReason::RetriesExhausted
        } else {
            reason
        };
        self.settle(slot, false, reason, None)
            .map_or(FailureOutcome::Ignored, FailureOutcome::Settled)
    }

    /// Drive timeouts, due retries and grace expiry. `resend` transmits a frame again and
    /// reports whether the transport took it.
    pub fn tick<F>(&mut self, now: Timestamp, policy: &RetryPolicy, mut resend: F) -> TickReport
    where
        F: FnMut(&TrackedMessage) -> bool,
    {
        let mut report = TickReport::default();
        for slot in 0..self.slots.len() {
            let Some(entry) = self.slots[slot].as_mut() else {
                continue;
            };

            if entry.acknowledged {
                if now.since(entry.sent_at) > policy.ack_grace {
                    trace!(id = %entry.message_id, "acknowledged entry released");
                    self.slots[slot] = None;
                }
                continue;
            }

            if entry.retry_pending {
                if now >= entry.next_retry_at {
                    debug!(id = %entry.message_id, attempt = entry.retry_count + 1, "resending");
                    let accepted = resend(entry);
                    entry.retry_pending = false;
                    entry.sent_at = now;
                    report.resent.push(entry.message_id);
                    if !accepted {
                        if let FailureOutcome::Settled(s) =
                            self.fail(slot, SettleReason::SendRefused, now, policy)
                        {
                            report.settled.push(s);
                        }
                    }
                }
                continue;
            }

            if now.since(entry.sent_at) > policy.ack_timeout {
                debug!(id = %entry.message_id, board = %entry.target, "no confirmation before timeout");
                if matches!(entry.confirmation, Confirmation::Plain) {
                    report.expired.push((entry.target.clone(), entry.kind()));
                    self.slots[slot] = None;
                    continue;
                }
                if let FailureOutcome::Settled(s) =
                    self.fail(slot, SettleReason::TimedOut, now, policy)
                {
                    report.settled.push(s);
                }
            }
        }
        report
    }

    /// Mark `slot` settled and build the notification. Entries with a callback are freed
    /// now; the rest linger as acknowledged to absorb duplicate confirmations.
    fn settle(
        &mut self,
        slot: usize,
        success: bool,
        reason: SettleReason,
        read_value: Option<u8>,
    ) -> Option<Settlement> {
        let mut entry = self.slots.get_mut(slot)?.take()?;
        let keep = success && !entry.confirmation.has_callback();
        let (pin, value) = entry.confirmation.pin_context();
        let target = entry.target.clone();
        let notifier = match std::mem::replace(&mut entry.confirmation, Confirmation::Plain) {
            Confirmation::PinControl {
                pin,
                value,
                callback: Some(cb),
            } => Some(Notifier::PinControl(
                cb,
                PinControlOutcome {
                    target: target.clone(),
                    pin,
                    value,
                    success,
                },
            )),
            Confirmation::PinRead {
                pin,
                callback: Some(cb),
            } => Some(Notifier::PinRead(
                cb,
                PinReadOutcome {
                    target: target.clone(),
                    pin,
                    value: read_value.unwrap_or(0),
                    success,
                },
            )),
            other => {
                entry.confirmation = other;
                None
            }
        };
        let settlement = Settlement {
            message_id: entry.message_id,
            target,
            kind: entry.kind(),
            success,
            reason,
            pin,
            value: read_value.or(value),
            notifier,
        };
        if keep {
            entry.acknowledged = true;
            entry.retry_pending = false;
            self.slots[slot] = Some(entry);
        }
        Some(settlement)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn board(name: &str) -> BoardId {
        BoardId::new(name).unwrap()
    }

    fn policy() -> RetryPolicy {
        RetryPolicy::from(&CoreConfig::default())
    }

    type Log = Arc<Mutex<Vec<PinControlOutcome>>>;

    fn pin_entry(target: &str, log: Option<&Log>, now: Timestamp) -> TrackedMessage {
        let callback: Option<PinControlCallback> = log.map(|l| {
            let l = l.clone();
            Box::new(move |o: PinControlOutcome| l.lock().unwrap().push(o)) as PinControlCallback
        });
        TrackedMessage::new(
            MessageId::generate(),
            board(target),
            Body::PinControl { pin: 5, value: 1 },
            Confirmation::PinControl {
                pin: 5,
                value: 1,
                callback,
            },
            now,
        )
    }

    fn plain_entry(target: &str, now: Timestamp) -> TrackedMessage {
        TrackedMessage::new(
            MessageId::generate(),
            board(target),
            Body::DirectMessage {
                message: "hi".into(),
            },
            Confirmation::Plain,
            now,
        )
    }

    #[test]
    fn pool_fills_then_refuses() {
        let mut t = MessageTracker::with_capacity(2);
        assert!(t.track(plain_entry("a", Timestamp::ZERO)).is_ok());
        assert!(t.track(plain_entry("b", Timestamp::ZERO)).is_ok());
        assert!(t.is_full());
        assert!(t.track(plain_entry("c", Timestamp::ZERO)).is_err());
    }

    #[test]
    fn duplicate_id_refused() {
        let mut t = MessageTracker::with_capacity(4);
        let e = plain_entry("a", Timestamp::ZERO);
        let mut twin = plain_entry("a", Timestamp::ZERO);
        twin.message_id = e.message_id;
        t.track(e).unwrap();
        assert!(t.track(twin).is_err());
    }

    #[test]
    fn ack_settles_once_and_frees_callback_entry() {
        let log: Log = Default::default();
        let mut t = MessageTracker::with_capacity(4);
        let e = pin_entry("porch", Some(&log), Timestamp::ZERO);
        let id = e.message_id;
        t.track(e).unwrap();

        let s = t.acknowledge(id, &board("porch")).unwrap();
        assert!(s.success);
        assert!(s.notify());
        assert!(t.is_empty());
        assert!(t.acknowledge(id, &board("porch")).is_none());
        assert_eq!(log.lock().unwrap().len(), 1);
        assert!(log.lock().unwrap()[0].success);
    }

    #[test]
    fn ack_without_callback_lingers_for_grace_window() {
        let mut t = MessageTracker::with_capacity(4);
        let e = plain_entry("porch", Timestamp::ZERO);
        let id = e.message_id;
        t.track(e).unwrap();
        let s = t.acknowledge(id, &board("porch")).unwrap();
        assert!(!s.has_callback());
        assert_eq!(t.len(), 1);
        // Duplicate ack is absorbed by the lingering entry.
        assert!(t.acknowledge(id, &board("porch")).is_none());

        let p = policy();
        t.tick(Timestamp::from_millis(9_000), &p, |_| true);
        assert_eq!(t.len(), 1);
        t.tick(Timestamp::from_millis(10_001), &p, |_| true);
        assert!(t.is_empty());
    }

    #[test]
    fn ack_from_other_board_ignored() {
        let mut t = MessageTracker::with_capacity(4);
        let e = plain_entry("porch", Timestamp::ZERO);
        let id = e.message_id;
        t.track(e).unwrap();
        assert!(t.acknowledge(id, &board("garage")).is_none());
        assert!(!t.get(0).unwrap().acknowledged);
    }

    #[test]
    fn link_failures_retry_then_settle_once() {
        let log: Log = Default::default();
        let mut t = MessageTracker::with_capacity(4);
        let p = policy();
        t.track(pin_entry("porch", Some(&log), Timestamp::ZERO)).unwrap();

        let mut now = Timestamp::ZERO;
        let mut sends = 1;
        loop {
            match t.on_link_status(0, false, now, &p) {
                FailureOutcome::RetryScheduled { at, .. } => {
                    now = at;
                    let report = t.tick(now, &p, |_| true);
                    sends += report.resent.len();
                }
                FailureOutcome::Settled(s) => {
                    assert_eq!(s.reason, SettleReason::RetriesExhausted);
                    s.notify();
                    break;
                }
                FailureOutcome::Ignored => panic!("failure ignored"),
            }
        }
        assert_eq!(sends, 4);
        assert!(t.is_empty());
        let log = log.lock().unwrap();
        assert_eq!(log.len(), 1);
        assert!(!log[0].success);
    }

    #[test]
    fn retries_disabled_settles_on_first_failure() {
        let mut t = MessageTracker::with_capacity(4);
        let mut p = policy();
        p.auto_retry = false;
        t.track(pin_entry("porch", None, Timestamp::ZERO)).unwrap();
        match t.on_link_status(0, false, Timestamp::ZERO, &p) {
            FailureOutcome::Settled(s) => assert_eq!(s.reason, SettleReason::LinkFailure),
            other => panic!("expected settle, got {other:?}"),
        }
        assert!(t.is_empty());
    }

    #[test]
    fn retry_waits_for_delay() {
        let mut t = MessageTracker::with_capacity(4);
        let p = policy();
        t.track(pin_entry("porch", None, Timestamp::ZERO)).unwrap();
        t.on_link_status(0, false, Timestamp::from_millis(10), &p);
        let early = t.tick(Timestamp::from_millis(400), &p, |_| true);
        assert!(early.resent.is_empty());
        let due = t.tick(Timestamp::from_millis(510), &p, |_| true);
        assert_eq!(due.resent.len(), 1);
        assert_eq!(t.get(0).unwrap().retry_count, 1);
    }

    #[test]
    fn resend_keeps_message_id_and_body() {
        let mut t = MessageTracker::with_capacity(4);
        let p = policy();
        let e = pin_entry("porch", None, Timestamp::ZERO);
        let id = e.message_id;
        t.track(e).unwrap();
        t.on_link_status(0, false, Timestamp::ZERO, &p);
        let mut seen = Vec::new();
        t.tick(Timestamp::from_secs(1), &p, |m| {
            seen.push((m.message_id, m.body.clone()));
            true
        });
        assert_eq!(seen, vec![(id, Body::PinControl { pin: 5, value: 1 })]);
    }

    #[test]
    fn ack_timeout_counts_as_failure_for_pin_control() {
        let mut t = MessageTracker::with_capacity(4);
        let p = policy();
        t.track(pin_entry("porch", None, Timestamp::ZERO)).unwrap();
        let r = t.tick(Timestamp::from_millis(5_001), &p, |_| true);
        assert!(r.settled.is_empty());
        let entry = t.get(0).unwrap();
        assert!(entry.retry_pending);
        assert_eq!(entry.retry_count, 1);
    }

    #[test]
    fn plain_entries_expire_silently() {
        let mut t = MessageTracker::with_capacity(4);
        let p = policy();
        t.track(plain_entry("porch", Timestamp::ZERO)).unwrap();
        let r = t.tick(Timestamp::from_millis(5_001), &p, |_| true);
        assert!(r.settled.is_empty());
        assert_eq!(r.expired, vec![(board("porch"), MessageKind::DirectMessage)]);
        assert!(t.is_empty());
    }

    #[test]
    fn refused_resend_counts_as_failure() {
        let mut t = MessageTracker::with_capacity(4);
        let mut p = policy();
        p.max_retries = 1;
        t.track(pin_entry("porch", None, Timestamp::ZERO)).unwrap();
        t.on_link_status(0, false, Timestamp::ZERO, &p);
        let r = t.tick(Timestamp::from_secs(1), &p, |_| false);
        assert_eq!(r.resent.len(), 1);
        assert_eq!(r.settled.len(), 1);
        assert_eq!(r.settled[0].reason, SettleReason::RetriesExhausted);
    }

    #[test]
    fn read_completes_with_value() {
        let got = Arc::new(Mutex::new(None));
        let sink = got.clone();
        let mut t = MessageTracker::with_capacity(4);
        let id = MessageId::generate();
        t.track(TrackedMessage::new(
            id,
            board("porch"),
            Body::PinReadRequest { pin: 3 },
            Confirmation::PinRead {
                pin: 3,
                callback: Some(Box::new(move |o| *sink.lock().unwrap() = Some(o))),
            },
            Timestamp::ZERO,
        ))
        .unwrap();
        // The request's ack does not complete a read.
        assert!(t.acknowledge(id, &board("porch")).is_none());
        let s = t
            .complete_read(id, &board("porch"), 1, true)
            .unwrap();
        assert_eq!(s.value, Some(1));
        s.notify();
        let outcome = got.lock().unwrap().clone().unwrap();
        assert_eq!(outcome.pin, 3);
        assert_eq!(outcome.value, 1);
        assert!(outcome.success);
        assert!(t.is_empty());
    }

    #[test]
    fn cleared_callbacks_keep_bookkeeping() {
        let log: Log = Default::default();
        let mut t = MessageTracker::with_capacity(4);
        let p = policy();
        t.track(pin_entry("porch", Some(&log), Timestamp::ZERO)).unwrap();
        assert_eq!(t.clear_pin_control_callbacks(), 1);
        match t.on_link_status(0, false, Timestamp::ZERO, &p) {
            FailureOutcome::RetryScheduled { retry: 1, .. } => {}
            other => panic!("expected retry, got {other:?}"),
        }
        assert!(log.lock().unwrap().is_empty());
    }
}
