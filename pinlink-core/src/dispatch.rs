//! Payload dispatch. The engine hands every well-formed, non-control frame to a
//! `Dispatcher` after any acknowledgement for it has gone out.

use tracing::trace;

use crate::ids::BoardId;

/// Receives payload frames. Every method defaults to ignoring the frame.
pub trait Dispatcher {
    /// Someone set one of our pins.
    fn on_pin_control(&mut self, _from: &BoardId, _pin: u8, _value: u8) {}
    /// Someone wants to drive one of their pins from ours.
    fn on_pin_subscribe(&mut self, _from: &BoardId, _pin: u8) {}
    /// A board announced a pin state.
    fn on_pin_state(&mut self, _from: &BoardId, _pin: u8, _value: u8) {}
    fn on_topic(&mut self, _from: &BoardId, _topic: &str, _message: &str) {}
    fn on_serial_data(&mut self, _from: &BoardId, _data: &str) {}
    fn on_direct_message(&mut self, _from: &BoardId, _message: &str) {}
    /// Value of a local pin for a remote reader. `None` answers with a failed read.
    fn on_pin_read(&mut self, _from: &BoardId, _pin: u8) -> Option<u8> {
        None
    }
    /// A board we had not seen before joined the directory.
    fn on_board_discovered(&mut self, _board: &BoardId) {}
}

/// Slots in the subscription table.
pub const MAX_SUBSCRIPTIONS: usize = 20;

pub type PinHandler = Box<dyn FnMut(&BoardId, u8, u8) + Send>;
pub type PinSubscribeHandler = Box<dyn FnMut(&BoardId, u8) + Send>;
pub type TopicHandler = Box<dyn FnMut(&BoardId, &str, &str) + Send>;
pub type TextHandler = Box<dyn FnMut(&BoardId, &str) + Send>;
pub type PinReadHandler = Box<dyn FnMut(&BoardId, u8) -> Option<u8> + Send>;
pub type BoardHandler = Box<dyn FnMut(&BoardId) + Send>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubscriptionError {
    #[error("subscription table full ({0} slots)")]
    Full(usize),
}

enum Route {
    Topic {
        topic: String,
        handler: TopicHandler,
    },
    PinState {
        board: BoardId,
        pin: u8,
        handler: PinHandler,
    },
    PinControl {
        board: BoardId,
        pin: u8,
        handler: PinHandler,
    },
}

/// Fixed-capacity fan-out table: topic subscribers, per-board pin listeners, and a handful of
/// catch-all handlers. The default `Dispatcher` for a `Node`.
pub struct Subscriptions {
    slots: Vec<Option<Route>>,
    pin_control: Option<PinHandler>,
    pin_subscribe: Option<PinSubscribeHandler>,
    pin_read: Option<PinReadHandler>,
    serial: Option<TextHandler>,
    direct: Option<TextHandler>,
    discovered: Option<BoardHandler>,
}

impl Default for Subscriptions {
    fn default() -> Self {
        Self::with_capacity(MAX_SUBSCRIPTIONS)
    }
}

impl Subscriptions {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: (0..capacity.max(1)).map(|_| None).collect(),
            pin_control: None,
            pin_subscribe: None,
            pin_read: None,
            serial: None,
            direct: None,
            discovered: None,
        }
    }

    pub fn len(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn insert(&mut self, route: Route) -> Result<(), SubscriptionError> {
        let capacity = self.slots.len();
        let slot = self
            .slots
            .iter_mut()
            .find(|s| s.is_none())
            .ok_or(SubscriptionError::Full(capacity))?;
        *slot = Some(route);
        Ok(())
    }

    fn remove_first(&mut self, pred: impl Fn(&Route) -> bool) -> bool {
        match self
            .slots
            .iter_mut()
            .find(|s| s.as_ref().is_some_and(|r| pred(r)))
        {
            Some(slot) => {
                *slot = None;
                true
            }
            None => false,
        }
    }

    pub fn subscribe_topic(
        &mut self,
        topic: impl Into<String>,
        handler: impl FnMut(&BoardId, &str, &str) + Send + 'static,
    ) -> Result<(), SubscriptionError> {
        self.insert(Route::Topic {
            topic: topic.into(),
            handler: Box::new(handler),
        })
    }

    pub fn unsubscribe_topic(&mut self, topic: &str) -> bool {
        self.remove_first(|r| matches!(r, Route::Topic { topic: t, .. } if t == topic))
    }

    pub fn listen_for_pin_state_from(
        &mut self,
        board: BoardId,
        pin: u8,
        handler: impl FnMut(&BoardId, u8, u8) + Send + 'static,
    ) -> Result<(), SubscriptionError> {
        self.insert(Route::PinState {
            board,
            pin,
            handler: Box::new(handler),
        })
    }

    pub fn stop_listening_for_pin_state_from(&mut self, board: &str, pin: u8) -> bool {
        self.remove_first(
            |r| matches!(r, Route::PinState { board: b, pin: p, .. } if b == board && *p == pin),
        )
    }

    /// Route pin-control frames from `board` for `pin` to `handler`. Pair with
    /// `Node::request_pin_control_from` to let that board know.
    pub fn accept_pin_control_from(
        &mut self,
        board: BoardId,
        pin: u8,
        handler: impl FnMut(&BoardId, u8, u8) + Send + 'static,
    ) -> Result<(), SubscriptionError> {
        self.insert(Route::PinControl {
            board,
            pin,
            handler: Box::new(handler),
        })
    }

    pub fn stop_accepting_pin_control_from(&mut self, board: &str, pin: u8) -> bool {
        self.remove_first(
            |r| matches!(r, Route::PinControl { board: b, pin: p, .. } if b == board && *p == pin),
        )
    }

    /// Catch-all for pin control and pin state frames.
    pub fn handle_pin_control(&mut self, handler: impl FnMut(&BoardId, u8, u8) + Send + 'static) {
        self.pin_control = Some(Box::new(handler));
    }

    /// Drop the catch-all and every per-board pin-control route.
    pub fn stop_handling_pin_control(&mut self) {
        self.pin_control = None;
        for slot in self.slots.iter_mut() {
            if matches!(slot, Some(Route::PinControl { .. })) {
                *slot = None;
            }
        }
    }

    pub fn on_pin_subscribe(&mut self, handler: impl FnMut(&BoardId, u8) + Send + 'static) {
        self.pin_subscribe = Some(Box::new(handler));
    }

    pub fn serve_pin_reads(
        &mut self,
        handler: impl FnMut(&BoardId, u8) -> Option<u8> + Send + 'static,
    ) {
        self.pin_read = Some(Box::new(handler));
    }

    pub fn receive_serial_data(&mut self, handler: impl FnMut(&BoardId, &str) + Send + 'static) {
        self.serial = Some(Box::new(handler));
    }

    pub fn receive_direct_messages(
        &mut self,
        handler: impl FnMut(&BoardId, &str) + Send + 'static,
    ) {
        self.direct = Some(Box::new(handler));
    }

    pub fn on_board_discovered(&mut self, handler: impl FnMut(&BoardId) + Send + 'static) {
        self.discovered = Some(Box::new(handler));
    }

    fn first_pin_route(&mut self, from: &BoardId, pin: u8, control: bool) -> Option<&mut PinHandler> {
        self.slots.iter_mut().flatten().find_map(|r| match r {
            Route::PinControl { board, pin: p, handler } if control && board == from && *p == pin => {
                Some(handler)
            }
            Route::PinState { board, pin: p, handler } if !control && board == from && *p == pin => {
                Some(handler)
            }
            _ => None,
        })
    }
}

impl Dispatcher for Subscriptions {
    fn on_pin_control(&mut self, from: &BoardId, pin: u8, value: u8) {
        let mut handled = false;
        if let Some(h) = self.pin_control.as_mut() {
            h(from, pin, value);
            handled = true;
        }
        if let Some(h) = self.first_pin_route(from, pin, true) {
            h(from, pin, value);
            handled = true;
        }
        if !handled {
            trace!(%from, pin, value, "pin control with no handler");
        }
    }

    fn on_pin_subscribe(&mut self, from: &BoardId, pin: u8) {
        if let Some(h) = self.pin_subscribe.as_mut() {
            h(from, pin);
        }
    }

    fn on_pin_state(&mut self, from: &BoardId, pin: u8, value: u8) {
        if let Some(h) = self.pin_control.as_mut() {
            h(from, pin, value);
        }
        if let Some(h) = self.first_pin_route(from, pin, false) {
            h(from, pin, value);
        }
    }

    fn on_topic(&mut self, from: &BoardId, topic: &str, message: &str) {
        for route in self.slots.iter_mut().flatten() {
            if let Route::Topic { topic: t, handler } = route {
                if t == topic {
                    handler(from, topic, message);
                }
            }
        }
    }

    fn on_serial_data(&mut self, from: &BoardId, data: &str) {
        if let Some(h) = self.serial.as_mut() {
            h(from, data);
        }
    }

    fn on_direct_message(&mut self, from: &BoardId, message: &str) {
        if let Some(h) = self.direct.as_mut() {
            h(from, message);
        }
    }

    fn on_pin_read(&mut self, from: &BoardId, pin: u8) -> Option<u8> {
        self.pin_read.as_mut().and_then(|h| h(from, pin))
    }

    fn on_board_discovered(&mut self, board: &BoardId) {
        if let Some(h) = self.discovered.as_mut() {
            h(board);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn board(name: &str) -> BoardId {
        BoardId::new(name).unwrap()
    }

    #[test]
    fn topic_fans_out_to_every_match() {
        let hits = Arc::new(Mutex::new(Vec::new()));
        let mut subs = Subscriptions::default();
        for tag in ["a", "b"] {
            let hits = hits.clone();
            subs.subscribe_topic("weather", move |from, _, msg| {
                hits.lock().unwrap().push(format!("{tag}:{from}:{msg}"));
            })
            .unwrap();
        }
        subs.subscribe_topic("other", |_, _, _| panic!("wrong topic")).unwrap();
        subs.on_topic(&board("roof"), "weather", "rain");
        assert_eq!(*hits.lock().unwrap(), vec!["a:roof:rain", "b:roof:rain"]);
    }

    #[test]
    fn table_is_bounded_and_slots_reused() {
        let mut subs = Subscriptions::with_capacity(2);
        subs.subscribe_topic("x", |_, _, _| {}).unwrap();
        subs.subscribe_topic("y", |_, _, _| {}).unwrap();
        assert_eq!(
            subs.subscribe_topic("z", |_, _, _| {}),
            Err(SubscriptionError::Full(2))
        );
        assert!(subs.unsubscribe_topic("x"));
        assert!(!subs.unsubscribe_topic("x"));
        assert!(subs.subscribe_topic("z", |_, _, _| {}).is_ok());
        assert_eq!(subs.len(), 2);
    }

    #[test]
    fn pin_control_routes_by_board_and_pin() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut subs = Subscriptions::default();
        let s = seen.clone();
        subs.accept_pin_control_from(board("desk"), 4, move |_, pin, v| {
            s.lock().unwrap().push((pin, v))
        })
        .unwrap();
        subs.on_pin_control(&board("desk"), 4, 1);
        subs.on_pin_control(&board("desk"), 5, 1);
        subs.on_pin_control(&board("hall"), 4, 0);
        assert_eq!(*seen.lock().unwrap(), vec![(4, 1)]);

        subs.stop_handling_pin_control();
        subs.on_pin_control(&board("desk"), 4, 0);
        assert_eq!(seen.lock().unwrap().len(), 1);
        assert!(subs.is_empty());
    }

    #[test]
    fn catch_all_sees_control_and_state() {
        let count = Arc::new(Mutex::new(0));
        let mut subs = Subscriptions::default();
        let c = count.clone();
        subs.handle_pin_control(move |_, _, _| *c.lock().unwrap() += 1);
        subs.on_pin_control(&board("a"), 1, 1);
        subs.on_pin_state(&board("a"), 1, 1);
        assert_eq!(*count.lock().unwrap(), 2);
    }

    #[test]
    fn pin_state_listener() {
        let last = Arc::new(Mutex::new(None));
        let mut subs = Subscriptions::default();
        let l = last.clone();
        subs.listen_for_pin_state_from(board("door"), 7, move |_, _, v| {
            *l.lock().unwrap() = Some(v)
        })
        .unwrap();
        subs.on_pin_state(&board("door"), 7, 1);
        assert_eq!(*last.lock().unwrap(), Some(1));
        assert!(subs.stop_listening_for_pin_state_from("door", 7));
        assert!(!subs.stop_listening_for_pin_state_from("door", 7));
    }

    #[test]
    fn pin_read_defaults_to_none() {
        let mut subs = Subscriptions::default();
        assert_eq!(subs.on_pin_read(&board("a"), 3), None);
        subs.serve_pin_reads(|_, pin| (pin == 3).then_some(1));
        assert_eq!(subs.on_pin_read(&board("a"), 3), Some(1));
        assert_eq!(subs.on_pin_read(&board("a"), 4), None);
    }
}
