//! In-memory radio shared by several nodes in one process.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use pinlink_core::{
    decode_datagram, BoardId, CoreConfig, Frame, LinkHandle, MacAddress, MessageKind, Node,
    Timestamp, Transport,
};

#[derive(Debug, Clone)]
pub struct Datagram {
    pub from: MacAddress,
    pub to: MacAddress,
    pub bytes: Vec<u8>,
}

impl Datagram {
    pub fn frame(&self) -> Frame {
        decode_datagram(&self.bytes).unwrap()
    }
}

#[derive(Default)]
pub struct Air {
    /// Everything ever transmitted, in order.
    pub log: Vec<Datagram>,
    queue: VecDeque<Datagram>,
    /// Destinations that never receive anything.
    pub dead: HashSet<MacAddress>,
    /// Drop the next n unicasts to an address.
    pub drop_next: HashMap<MacAddress, usize>,
    pub report_delivery: bool,
}

impl Air {
    pub fn count_to(&self, to: MacAddress, kind: MessageKind) -> usize {
        self.log
            .iter()
            .filter(|d| d.to == to && d.frame().kind() == kind)
            .count()
    }

    pub fn count_broadcast(&self, kind: MessageKind) -> usize {
        self.count_to(MacAddress::BROADCAST, kind)
    }

    pub fn last_queued(&self) -> Option<&Datagram> {
        self.queue.back()
    }
}

pub struct Port {
    pub mac: MacAddress,
    air: Arc<Mutex<Air>>,
}

impl Transport for Port {
    type Address = MacAddress;

    fn send(&mut self, to: &MacAddress, bytes: &[u8]) -> bool {
        self.transmit(*to, bytes);
        true
    }

    fn broadcast(&mut self, bytes: &[u8]) -> bool {
        self.transmit(MacAddress::BROADCAST, bytes);
        true
    }

    fn reports_delivery(&self) -> bool {
        self.air.lock().unwrap().report_delivery
    }
}

impl Port {
    fn transmit(&self, to: MacAddress, bytes: &[u8]) {
        let d = Datagram {
            from: self.mac,
            to,
            bytes: bytes.to_vec(),
        };
        let mut air = self.air.lock().unwrap();
        air.log.push(d.clone());
        air.queue.push_back(d);
    }
}

pub fn mac(i: usize) -> MacAddress {
    MacAddress([0x02, 0, 0, 0, 0, i as u8 + 1])
}

pub fn board(name: &str) -> BoardId {
    BoardId::new(name).unwrap()
}

pub struct Net {
    pub air: Arc<Mutex<Air>>,
    pub nodes: Vec<Node<Port>>,
    handles: Vec<(MacAddress, LinkHandle<MacAddress>)>,
}

impl Net {
    pub fn new(names: &[&str], config: CoreConfig, report_delivery: bool) -> Self {
        let air = Arc::new(Mutex::new(Air {
            report_delivery,
            ..Air::default()
        }));
        let mut nodes = Vec::new();
        let mut handles = Vec::new();
        for (i, name) in names.iter().enumerate() {
            let port = Port {
                mac: mac(i),
                air: air.clone(),
            };
            let node = Node::new(board(name), config.clone(), port);
            handles.push((mac(i), node.link_handle()));
            nodes.push(node);
        }
        Self { air, nodes, handles }
    }

    pub fn begin(&mut self, now: Timestamp) {
        for node in &mut self.nodes {
            node.begin(now);
        }
    }

    /// Move queued datagrams into receivers' inboxes.
    pub fn pump(&mut self) -> usize {
        let batch: Vec<Datagram> = {
            let mut air = self.air.lock().unwrap();
            air.queue.drain(..).collect()
        };
        let n = batch.len();
        for d in batch {
            let delivered = {
                let mut air = self.air.lock().unwrap();
                if d.to == MacAddress::BROADCAST {
                    true
                } else if air.dead.contains(&d.to) {
                    false
                } else if let Some(left) = air.drop_next.get_mut(&d.to).filter(|n| **n > 0) {
                    *left -= 1;
                    false
                } else {
                    true
                }
            };
            if delivered {
                for (m, h) in &self.handles {
                    if *m != d.from && (d.to == MacAddress::BROADCAST || *m == d.to) {
                        h.on_receive(d.from, &d.bytes);
                    }
                }
            }
            if self.air.lock().unwrap().report_delivery {
                if let Some((_, h)) = self.handles.iter().find(|(m, _)| *m == d.from) {
                    h.on_delivery_status(d.to, delivered);
                }
            }
        }
        n
    }

    /// Update every node at `now` until the air is quiet.
    pub fn step(&mut self, now: Timestamp) {
        for _ in 0..16 {
            for node in &mut self.nodes {
                node.update(now);
            }
            if self.pump() == 0 {
                return;
            }
        }
    }

    /// Step from `from` to `to` inclusive, every `tick_ms`.
    pub fn run(&mut self, from: u64, to: u64, tick_ms: u64) {
        let mut t = from;
        while t <= to {
            self.step(Timestamp::from_millis(t));
            t += tick_ms;
        }
    }
}
