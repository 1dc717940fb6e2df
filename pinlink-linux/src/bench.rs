//! Simulated pin bank standing in for GPIO on a Linux box. Incoming payloads are printed.

use std::collections::HashMap;

use pinlink_core::{BoardId, Dispatcher};
use tracing::info;

#[derive(Debug, Default)]
pub struct Bench {
    pins: HashMap<u8, u8>,
}

impl Bench {
    pub fn pin(&self, pin: u8) -> Option<u8> {
        self.pins.get(&pin).copied()
    }
}

impl Dispatcher for Bench {
    fn on_pin_control(&mut self, from: &BoardId, pin: u8, value: u8) {
        info!(%from, pin, value, "pin set remotely");
        self.pins.insert(pin, value);
        println!("{from} set pin {pin} = {value}");
    }

    fn on_pin_subscribe(&mut self, from: &BoardId, pin: u8) {
        println!("{from} wants to follow our pin {pin}");
    }

    fn on_pin_state(&mut self, from: &BoardId, pin: u8, value: u8) {
        println!("{from}: pin {pin} is {value}");
    }

    fn on_topic(&mut self, from: &BoardId, topic: &str, message: &str) {
        println!("[{topic}] {from}: {message}");
    }

    fn on_serial_data(&mut self, from: &BoardId, data: &str) {
        println!("{from} (serial): {data}");
    }

    fn on_direct_message(&mut self, from: &BoardId, message: &str) {
        println!("{from} says: {message}");
    }

    fn on_pin_read(&mut self, _from: &BoardId, pin: u8) -> Option<u8> {
        self.pin(pin)
    }

    fn on_board_discovered(&mut self, board: &BoardId) {
        println!("found {board}");
    }
}
