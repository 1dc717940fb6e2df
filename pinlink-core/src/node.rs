//! The engine instance. Host-driven: the host feeds timestamps, link events (through a
//! `LinkHandle`) and API calls; the node talks to the radio only through `Transport`.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use heapless::Deque;
use tracing::{debug, info, trace, warn};

use crate::config::CoreConfig;
use crate::correlator::correlate;
use crate::discovery::DiscoveryScheduler;
use crate::dispatch::{Dispatcher, Subscriptions};
use crate::ids::{BoardId, LinkAddress, MessageId};
use crate::link::{LinkEvent, LinkHandle};
use crate::peers::{PeerDirectory, Registration};
use crate::protocol::{Body, Frame, MessageKind};
use crate::stats::{LinkStats, PeerStatus, StatusReport};
use crate::time::{Clock, Timestamp};
use crate::tracker::{
    Confirmation, FailureOutcome, MessageTracker, PinControlCallback, PinControlOutcome,
    PinReadOutcome, RetryPolicy, SettleReason, Settlement, TrackedMessage,
};
use crate::wire::{decode_datagram, encode_frame_limited, FrameEncodeError, MAX_FRAME_LEN};

/// Pin-read answers waiting to go out, and unmatched answers kept for blocking readers.
pub const MAX_QUEUED_RESPONSES: usize = 10;

/// Radio primitives the host provides. Sends are best-effort; `true` only means the frame
/// was accepted for transmission.
pub trait Transport {
    type Address: LinkAddress;

    fn send(&mut self, to: &Self::Address, bytes: &[u8]) -> bool;

    fn broadcast(&mut self, bytes: &[u8]) -> bool;

    /// Largest datagram the link carries. Capped at `MAX_FRAME_LEN` by the codec.
    fn max_frame_len(&self) -> usize {
        MAX_FRAME_LEN
    }

    /// True if the host will call `LinkHandle::on_delivery_status` after sends.
    fn reports_delivery(&self) -> bool {
        false
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("node not started")]
    NotStarted,
    #[error("unknown board {0:?}")]
    UnknownBoard(String),
    #[error(transparent)]
    Encode(#[from] FrameEncodeError),
    #[error("transport refused the frame")]
    Refused,
}

/// How a successful send call left the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Tracked; the outcome will be reported through the callback and hooks.
    Tracked(MessageId),
    /// Sent best-effort because the tracker was full (or had no way to confirm). Any
    /// completion callback was dropped.
    Untracked(Option<MessageId>),
    /// Fire-and-forget frame (broadcasts, unconfirmed unicasts).
    Sent,
}

impl SendOutcome {
    pub fn message_id(&self) -> Option<MessageId> {
        match self {
            SendOutcome::Tracked(id) => Some(*id),
            SendOutcome::Untracked(id) => *id,
            SendOutcome::Sent => None,
        }
    }
}

/// Reported to the failure hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendFailure {
    /// Board id, or `"broadcast"`.
    pub board: String,
    /// Kind of the tracked message the failure was attributed to, if any.
    pub kind: Option<MessageKind>,
    pub reason: SettleReason,
}

pub type SendStatusHook = Box<dyn FnMut(&str, Option<MessageKind>, bool) + Send>;
pub type SendFailureHook = Box<dyn FnMut(&SendFailure) + Send>;

#[derive(Debug)]
struct UnclaimedRead {
    request_id: MessageId,
    outcome: PinReadOutcome,
    received_at: Timestamp,
}

pub struct Node<T: Transport, D: Dispatcher = Subscriptions> {
    board_id: BoardId,
    config: CoreConfig,
    transport: T,
    dispatcher: D,
    peers: PeerDirectory<T::Address>,
    tracker: MessageTracker,
    discovery: DiscoveryScheduler,
    inbox: LinkHandle<T::Address>,
    replies: Deque<(T::Address, Frame), MAX_QUEUED_RESPONSES>,
    unclaimed_reads: Vec<UnclaimedRead>,
    stats: LinkStats,
    send_status_hook: Option<SendStatusHook>,
    send_failure_hook: Option<SendFailureHook>,
    started: bool,
}

impl<T: Transport> Node<T, Subscriptions> {
    /// Node with the default subscription-table dispatcher.
    pub fn new(board_id: BoardId, config: CoreConfig, transport: T) -> Self {
        Self::with_dispatcher(board_id, config, transport, Subscriptions::default())
    }

    pub fn subscriptions(&mut self) -> &mut Subscriptions {
        &mut self.dispatcher
    }
}

impl<T: Transport, D: Dispatcher> Node<T, D> {
    pub fn with_dispatcher(board_id: BoardId, config: CoreConfig, transport: T, dispatcher: D) -> Self {
        let config = config.clamped();
        Self {
            board_id,
            peers: PeerDirectory::with_capacity(config.peer_capacity),
            tracker: MessageTracker::with_capacity(config.tracker_capacity),
            discovery: DiscoveryScheduler::new(config.discovery.clone()),
            config,
            transport,
            dispatcher,
            inbox: LinkHandle::new(),
            replies: Deque::new(),
            unclaimed_reads: Vec::new(),
            stats: LinkStats::default(),
            send_status_hook: None,
            send_failure_hook: None,
            started: false,
        }
    }

    /// Start the discovery schedule and announce ourselves right away.
    pub fn begin(&mut self, now: Timestamp) {
        self.started = true;
        self.discovery.start(now);
        info!(board = %self.board_id, "pinlink node started");
        if self.discovery.poll(now) {
            self.announce();
        }
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Handle for the transport's receive and delivery-status callbacks.
    pub fn link_handle(&self) -> LinkHandle<T::Address> {
        self.inbox.clone()
    }

    pub fn board_id(&self) -> &BoardId {
        &self.board_id
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn stats(&self) -> &LinkStats {
        &self.stats
    }

    pub fn peers(&self) -> &PeerDirectory<T::Address> {
        &self.peers
    }

    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn dispatcher(&self) -> &D {
        &self.dispatcher
    }

    pub fn dispatcher_mut(&mut self) -> &mut D {
        &mut self.dispatcher
    }

    pub fn enable_acknowledgements(&mut self, on: bool) {
        self.config.acknowledgements = on;
    }

    pub fn acknowledgements_enabled(&self) -> bool {
        self.config.acknowledgements
    }

    pub fn enable_auto_retry(&mut self, on: bool) {
        self.config.auto_retry = on;
    }

    pub fn set_max_retries(&mut self, n: u8) {
        self.config.set_max_retries(n);
    }

    pub fn set_retry_delay(&mut self, delay: Duration) {
        self.config.set_retry_delay(delay);
    }

    pub fn is_board_available(&self, board_id: &str) -> bool {
        self.peers.is_available(board_id, &self.board_id)
    }

    pub fn peer_count(&self) -> usize {
        self.peers.count()
    }

    pub fn peer_name_at(&self, index: usize) -> Option<&BoardId> {
        self.peers.name_at(index)
    }

    /// Called for every delivery status whose address resolves, and for every acknowledgement
    /// that settles a tracked message.
    pub fn on_send_status(&mut self, hook: impl FnMut(&str, Option<MessageKind>, bool) + Send + 'static) {
        self.send_status_hook = Some(Box::new(hook));
    }

    /// Called for every link failure whose address resolves, and for every tracked message that
    /// ends without confirmation.
    pub fn on_send_failure(&mut self, hook: impl FnMut(&SendFailure) + Send + 'static) {
        self.send_failure_hook = Some(Box::new(hook));
    }

    /// Stop notifying pin-control callers. In-flight retries and timeouts carry on.
    pub fn clear_pin_control_callbacks(&mut self) {
        let n = self.tracker.clear_pin_control_callbacks();
        debug!(cleared = n, "pin control callbacks cleared");
    }

    /// One cooperative tick: drain the link inbox, send queued replies, drive retries and
    /// timeouts, and broadcast presence when due.
    pub fn update(&mut self, now: Timestamp) {
        if !self.started {
            return;
        }
        while let Some(event) = self.inbox.pop() {
            match event {
                LinkEvent::Received { from, bytes } => self.handle_frame(from, &bytes, now),
                LinkEvent::DeliveryStatus { to, success } => {
                    self.handle_delivery_status(to, success, now)
                }
            }
        }
        self.flush_replies();
        self.drive_tracker(now);
        if self.discovery.poll(now) {
            self.announce();
        }
        self.expire_unclaimed_reads(now);
    }

    // ---- host API ----

    /// Set `pin` to `value` on `target`. Confirmed and retried when acknowledgements or link
    /// delivery reports are available.
    pub fn control_remote_pin(
        &mut self,
        target: &str,
        pin: u8,
        value: u8,
        now: Timestamp,
    ) -> Result<SendOutcome, SendError> {
        let confirmation = Confirmation::PinControl {
            pin,
            value,
            callback: None,
        };
        self.send_unicast(target, Body::PinControl { pin, value }, Some(confirmation), now)
    }

    /// Like `control_remote_pin`, reporting the final outcome exactly once through `on_complete`.
    pub fn control_remote_pin_with(
        &mut self,
        target: &str,
        pin: u8,
        value: u8,
        now: Timestamp,
        on_complete: impl FnOnce(PinControlOutcome) + Send + 'static,
    ) -> Result<SendOutcome, SendError> {
        let callback: PinControlCallback = Box::new(on_complete);
        let confirmation = Confirmation::PinControl {
            pin,
            value,
            callback: Some(callback),
        };
        self.send_unicast(target, Body::PinControl { pin, value }, Some(confirmation), now)
    }

    /// Ask `target` for the state of `pin`. The answer (or a failure after the ack timeout)
    /// arrives through `on_response`. Never retried.
    pub fn read_remote_pin(
        &mut self,
        target: &str,
        pin: u8,
        now: Timestamp,
        on_response: impl FnOnce(PinReadOutcome) + Send + 'static,
    ) -> Result<SendOutcome, SendError> {
        let confirmation = Confirmation::PinRead {
            pin,
            callback: Some(Box::new(on_response)),
        };
        self.send_unicast(target, Body::PinReadRequest { pin }, Some(confirmation), now)
    }

    /// Read a remote pin, spinning on `update` until the answer lands or `timeout` passes.
    pub fn read_remote_pin_blocking<C: Clock>(
        &mut self,
        target: &str,
        pin: u8,
        clock: &C,
        timeout: Duration,
    ) -> Option<u8> {
        let answer: Arc<Mutex<Option<PinReadOutcome>>> = Arc::default();
        let sink = Arc::clone(&answer);
        let start = clock.now();
        let outcome = self
            .read_remote_pin(target, pin, start, move |o| {
                if let Ok(mut slot) = sink.lock() {
                    *slot = Some(o);
                }
            })
            .map_err(|e| debug!(board = target, pin, error = %e, "remote read not sent"))
            .ok()?;
        let request_id = outcome.message_id()?;
        let deadline = start + timeout;
        loop {
            let now = clock.now();
            self.update(now);
            let landed = answer.lock().ok().and_then(|mut slot| slot.take());
            if let Some(o) = landed.or_else(|| self.take_read_response(request_id)) {
                return o.success.then_some(o.value);
            }
            if now >= deadline {
                debug!(board = target, pin, "remote read timed out");
                return None;
            }
            std::thread::yield_now();
        }
    }

    /// A read answer that arrived without a tracked request waiting for it.
    pub fn take_read_response(&mut self, request_id: MessageId) -> Option<PinReadOutcome> {
        let i = self
            .unclaimed_reads
            .iter()
            .position(|r| r.request_id == request_id)?;
        Some(self.unclaimed_reads.remove(i).outcome)
    }

    /// Ask `target` to drive its `pin` from ours (it will see a pin-subscribe frame).
    pub fn request_pin_control_from(
        &mut self,
        target: &str,
        pin: u8,
        now: Timestamp,
    ) -> Result<SendOutcome, SendError> {
        let confirmation = self.config.acknowledgements.then_some(Confirmation::Plain);
        self.send_unicast(target, Body::PinSubscribe { pin }, confirmation, now)
    }

    pub fn send_direct_message(
        &mut self,
        target: &str,
        message: &str,
        now: Timestamp,
    ) -> Result<SendOutcome, SendError> {
        let confirmation = self.config.acknowledgements.then_some(Confirmation::Plain);
        let body = Body::DirectMessage {
            message: message.to_string(),
        };
        self.send_unicast(target, body, confirmation, now)
    }

    pub fn broadcast_pin_state(&mut self, pin: u8, value: u8) -> Result<SendOutcome, SendError> {
        self.send_broadcast(Body::PinPublish { pin, value })
    }

    pub fn publish_topic(&mut self, topic: &str, message: &str) -> Result<SendOutcome, SendError> {
        self.send_broadcast(Body::Topic {
            topic: topic.to_string(),
            message: message.to_string(),
        })
    }

    pub fn forward_serial_data(&mut self, data: &str) -> Result<SendOutcome, SendError> {
        self.send_broadcast(Body::SerialData {
            data: data.to_string(),
        })
    }

    /// Counters plus the peer list, as JSON.
    pub fn status_json(&self, now: Timestamp) -> serde_json::Result<String> {
        let status = if self.started { "running" } else { "stopped" };
        let mut report = StatusReport::new(status, self.board_id.to_string(), &self.stats);
        report.peers_count = self.peers.count();
        report.tracked_in_flight = self.tracker.len();
        report.inbox_dropped = self.inbox.dropped();
        report.peers = self
            .peers
            .iter()
            .map(|p| PeerStatus {
                board_id: p.board_id.to_string(),
                address: p.address.to_string(),
                last_seen_seconds: now.since(p.last_seen).as_secs(),
            })
            .collect();
        report.to_json()
    }

    // ---- outbound ----

    fn send_broadcast(&mut self, body: Body) -> Result<SendOutcome, SendError> {
        if !self.started {
            return Err(SendError::NotStarted);
        }
        let frame = Frame::new(self.board_id.clone(), body);
        let bytes = encode_frame_limited(&frame, self.transport.max_frame_len())?;
        self.stats.frames_sent = self.stats.frames_sent.saturating_add(1);
        if !self.transport.broadcast(&bytes) {
            self.stats.send_failures = self.stats.send_failures.saturating_add(1);
            return Err(SendError::Refused);
        }
        trace!(kind = ?frame.kind(), "broadcast sent");
        Ok(SendOutcome::Sent)
    }

    fn send_unicast(
        &mut self,
        target: &str,
        body: Body,
        confirmation: Option<Confirmation>,
        now: Timestamp,
    ) -> Result<SendOutcome, SendError> {
        if !self.started {
            return Err(SendError::NotStarted);
        }
        let peer = self
            .peers
            .get(target)
            .ok_or_else(|| SendError::UnknownBoard(target.to_string()))?;
        let (target_id, address) = (peer.board_id.clone(), peer.address.clone());

        // Reads are matched by id; everything else can only be confirmed through an ack or a
        // link delivery report.
        let confirmable = match &confirmation {
            Some(Confirmation::PinRead { .. }) => true,
            Some(_) => self.config.acknowledgements || self.transport.reports_delivery(),
            None => false,
        };
        let message_id = (confirmable || self.config.acknowledgements).then(MessageId::generate);
        let mut frame = Frame::new(self.board_id.clone(), body);
        if let Some(id) = message_id {
            frame = frame.with_message_id(id);
        }
        let bytes = encode_frame_limited(&frame, self.transport.max_frame_len())?;

        let mut unconfirmed = None;
        let mut tracked_slot = None;
        match (confirmation, message_id) {
            (Some(confirmation), Some(id)) if confirmable => {
                let entry =
                    TrackedMessage::new(id, target_id.clone(), frame.body.clone(), confirmation, now);
                match self.tracker.track(entry) {
                    Ok(slot) => tracked_slot = Some(slot),
                    Err(_) => {
                        self.stats.untracked_sends = self.stats.untracked_sends.saturating_add(1);
                        warn!(board = target, kind = ?frame.kind(), "tracker full, sending untracked");
                    }
                }
            }
            (confirmation, _) => unconfirmed = confirmation,
        }

        self.stats.frames_sent = self.stats.frames_sent.saturating_add(1);
        let accepted = self.transport.send(&address, &bytes);
        if !accepted {
            self.stats.send_failures = self.stats.send_failures.saturating_add(1);
            if let Some(slot) = tracked_slot {
                self.tracker.discard(slot);
            }
        }

        // No way to confirm: report what the transport told us, refusal included.
        if let Some(Confirmation::PinControl {
            pin,
            value,
            callback: Some(cb),
        }) = unconfirmed
        {
            cb(PinControlOutcome {
                target: target_id,
                pin,
                value,
                success: accepted,
            });
        }

        if !accepted {
            debug!(board = target, kind = ?frame.kind(), "transport refused frame");
            return Err(SendError::Refused);
        }
        trace!(board = target, kind = ?frame.kind(), id = ?message_id, "unicast sent");

        Ok(match (tracked_slot, message_id) {
            (Some(_), Some(id)) => SendOutcome::Tracked(id),
            (None, id) if confirmable => SendOutcome::Untracked(id),
            _ => SendOutcome::Sent,
        })
    }

    fn send_control(&mut self, to: &T::Address, body: Body) -> bool {
        let frame = Frame::new(self.board_id.clone(), body);
        self.send_frame(to, &frame)
    }

    fn send_frame(&mut self, to: &T::Address, frame: &Frame) -> bool {
        match encode_frame_limited(frame, self.transport.max_frame_len()) {
            Ok(bytes) => {
                self.stats.frames_sent = self.stats.frames_sent.saturating_add(1);
                let ok = self.transport.send(to, &bytes);
                if !ok {
                    self.stats.send_failures = self.stats.send_failures.saturating_add(1);
                }
                ok
            }
            Err(e) => {
                warn!(kind = ?frame.kind(), error = %e, "frame not encodable");
                false
            }
        }
    }

    fn announce(&mut self) {
        match self.send_broadcast(Body::Discovery) {
            Ok(_) => debug!(regime = ?self.discovery.regime(), "presence broadcast"),
            Err(e) => debug!(error = %e, "presence broadcast failed"),
        }
    }

    fn flush_replies(&mut self) {
        while let Some((to, frame)) = self.replies.pop_front() {
            self.send_frame(&to, &frame);
        }
    }

    fn queue_reply(&mut self, to: T::Address, frame: Frame) {
        if self.replies.is_full() {
            self.replies.pop_front();
            warn!("reply queue full, dropped oldest");
        }
        if self.replies.push_back((to, frame)).is_err() {
            warn!("reply dropped");
        }
    }

    // ---- inbound ----

    fn handle_frame(&mut self, from: T::Address, bytes: &[u8], now: Timestamp) {
        self.stats.frames_received = self.stats.frames_received.saturating_add(1);
        let frame = match decode_datagram(bytes) {
            Ok(f) => f,
            Err(e) => {
                self.stats.malformed_dropped = self.stats.malformed_dropped.saturating_add(1);
                warn!(%from, error = %e, "malformed frame dropped");
                return;
            }
        };
        if frame.sender == self.board_id {
            trace!("own frame ignored");
            return;
        }
        let Frame {
            sender,
            message_id,
            body,
            ..
        } = frame;
        trace!(%sender, kind = ?body.kind(), "frame received");

        match body {
            Body::Discovery => {
                if self.admit(&sender, from.clone(), now) {
                    self.send_control(&from, Body::DiscoveryResponse);
                }
            }
            Body::DiscoveryResponse => {
                self.admit(&sender, from, now);
            }
            Body::Acknowledgement { ack_id } => {
                self.touch(&sender, from, now);
                self.stats.acks_received = self.stats.acks_received.saturating_add(1);
                if let Some(settled) = self.tracker.acknowledge(ack_id, &sender) {
                    self.finish(settled);
                }
            }
            body => {
                self.touch(&sender, from.clone(), now);
                // Ack goes out before any handler sees the payload.
                if let Some(id) = message_id {
                    if self.config.acknowledgements {
                        self.send_control(&from, Body::Acknowledgement { ack_id: id });
                    }
                }
                self.dispatch(sender, from, message_id, body, now);
            }
        }
    }

    fn dispatch(
        &mut self,
        sender: BoardId,
        from: T::Address,
        message_id: Option<MessageId>,
        body: Body,
        now: Timestamp,
    ) {
        match body {
            Body::PinControl { pin, value } => self.dispatcher.on_pin_control(&sender, pin, value),
            Body::PinSubscribe { pin } => self.dispatcher.on_pin_subscribe(&sender, pin),
            Body::PinPublish { pin, value } => self.dispatcher.on_pin_state(&sender, pin, value),
            Body::Topic { topic, message } => self.dispatcher.on_topic(&sender, &topic, &message),
            Body::SerialData { data } => self.dispatcher.on_serial_data(&sender, &data),
            Body::DirectMessage { message } => self.dispatcher.on_direct_message(&sender, &message),
            Body::PinReadRequest { pin } => {
                let Some(request_id) = message_id else {
                    debug!(%sender, pin, "read request without id dropped");
                    return;
                };
                let answer = self.dispatcher.on_pin_read(&sender, pin);
                let reply = Frame::new(
                    self.board_id.clone(),
                    Body::PinReadResponse {
                        request_id,
                        pin,
                        value: answer.unwrap_or(0),
                        success: answer.is_some(),
                    },
                );
                self.queue_reply(from, reply);
            }
            Body::PinReadResponse {
                request_id,
                pin,
                value,
                success,
            } => {
                match self.tracker.complete_read(request_id, &sender, value, success) {
                    Some(settled) => {
                        settled.notify();
                    }
                    None => self.keep_unclaimed_read(
                        request_id,
                        PinReadOutcome {
                            target: sender,
                            pin,
                            value,
                            success,
                        },
                        now,
                    ),
                }
            }
            Body::Discovery | Body::DiscoveryResponse | Body::Acknowledgement { .. } => {}
        }
    }

    /// Register or refresh a board seen through discovery. True if it was new to us.
    fn admit(&mut self, board: &BoardId, from: T::Address, now: Timestamp) -> bool {
        match self.peers.register_or_refresh(board, from, now) {
            Ok(Registration::Replaced { evicted }) => {
                info!(board = %board, evicted = %evicted, "board discovered");
                self.dispatcher.on_board_discovered(board);
                true
            }
            Ok(Registration::Added) => {
                info!(board = %board, "board discovered");
                self.dispatcher.on_board_discovered(board);
                true
            }
            Ok(_) => false,
            Err(e) => {
                warn!(board = %board, error = %e, "discovery rejected");
                false
            }
        }
    }

    /// Any frame from a known board counts as a sighting.
    fn touch(&mut self, board: &BoardId, from: T::Address, now: Timestamp) {
        if self.peers.contains(board.as_str()) {
            if let Err(e) = self.peers.register_or_refresh(board, from, now) {
                warn!(board = %board, error = %e, "sighting rejected");
            }
        }
    }

    fn keep_unclaimed_read(&mut self, request_id: MessageId, outcome: PinReadOutcome, now: Timestamp) {
        if self.unclaimed_reads.len() >= MAX_QUEUED_RESPONSES {
            self.unclaimed_reads.remove(0);
        }
        self.unclaimed_reads.push(UnclaimedRead {
            request_id,
            outcome,
            received_at: now,
        });
    }

    fn expire_unclaimed_reads(&mut self, now: Timestamp) {
        let ttl = self.config.pending_response_timeout();
        self.unclaimed_reads
            .retain(|r| now.since(r.received_at) <= ttl);
    }

    // ---- delivery ----

    fn handle_delivery_status(&mut self, to: T::Address, success: bool, now: Timestamp) {
        let c = correlate(&to, &self.peers, &self.tracker);
        if !success {
            self.stats.send_failures = self.stats.send_failures.saturating_add(1);
        }
        let kind = c.slot.and_then(|s| self.tracker.get(s)).map(|m| m.kind());
        if let Some(recipient) = &c.recipient {
            let board = recipient.as_str().to_string();
            if let Some(hook) = self.send_status_hook.as_mut() {
                hook(&board, kind, success);
            }
            if !success {
                if let Some(hook) = self.send_failure_hook.as_mut() {
                    hook(&SendFailure {
                        board,
                        kind,
                        reason: SettleReason::LinkFailure,
                    });
                }
            }
        }
        let Some(slot) = c.slot else {
            return;
        };
        let policy = RetryPolicy::from(&self.config);
        match self.tracker.on_link_status(slot, success, now, &policy) {
            FailureOutcome::Settled(settled) => {
                // The per-attempt status was reported above; only a final failure adds more.
                if !settled.success {
                    if let Some(hook) = self.send_failure_hook.as_mut() {
                        hook(&SendFailure {
                            board: settled.target.to_string(),
                            kind: Some(settled.kind),
                            reason: settled.reason,
                        });
                    }
                }
                settled.notify();
            }
            FailureOutcome::RetryScheduled { retry, at } => {
                debug!(%to, retry, at = at.as_millis(), "delivery failed, retry scheduled");
            }
            FailureOutcome::Ignored => {}
        }
    }

    fn drive_tracker(&mut self, now: Timestamp) {
        let policy = RetryPolicy::from(&self.config);
        let transport = &mut self.transport;
        let peers = &self.peers;
        let stats = &mut self.stats;
        let local = &self.board_id;
        let report = self.tracker.tick(now, &policy, |m| {
            let Some(address) = peers.resolve(m.target.as_str()) else {
                debug!(board = %m.target, "retry target left the directory");
                return false;
            };
            let frame = Frame::new(local.clone(), m.body.clone()).with_message_id(m.message_id);
            let Ok(bytes) = encode_frame_limited(&frame, transport.max_frame_len()) else {
                return false;
            };
            stats.retries = stats.retries.saturating_add(1);
            stats.frames_sent = stats.frames_sent.saturating_add(1);
            let ok = transport.send(address, &bytes);
            if !ok {
                stats.send_failures = stats.send_failures.saturating_add(1);
            }
            ok
        });
        for (board, kind) in report.expired {
            if let Some(hook) = self.send_failure_hook.as_mut() {
                hook(&SendFailure {
                    board: board.to_string(),
                    kind: Some(kind),
                    reason: SettleReason::TimedOut,
                });
            }
        }
        for settled in report.settled {
            self.finish(settled);
        }
    }

    /// Fire hooks for a settled tracked message, then its callback.
    fn finish(&mut self, settled: Settlement) {
        if settled.success {
            if let Some(hook) = self.send_status_hook.as_mut() {
                hook(settled.target.as_str(), Some(settled.kind), true);
            }
        } else if let Some(hook) = self.send_failure_hook.as_mut() {
            hook(&SendFailure {
                board: settled.target.to_string(),
                kind: Some(settled.kind),
                reason: settled.reason,
            });
        }
        settled.notify();
    }
}
