//! Responder-side models standing in for the device under test.

use std::collections::{HashMap, VecDeque};

use log::trace;
use serde::Deserialize;

use crate::signals::{BusSnapshot, RequesterSignals, ResponderSignals};

/// The device answering on the link.
///
/// The kernel calls `on_rising_edge` with the pre-edge values, commits the
/// driver's new requester bundle, then calls `settle` so combinational
/// outputs can follow the new inputs within the same cycle.
pub trait Responder {
    /// Registered update at a rising clock edge.
    fn on_rising_edge(&mut self, bus: &BusSnapshot);

    /// Current outputs given the committed requester lines.
    fn settle(&mut self, rst: bool, req: &RequesterSignals) -> ResponderSignals;
}

/// Response timing of a [`MemorySlave`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SlaveTiming {
    /// Edges between accepting a request and sampling its `ack`. Zero
    /// acknowledges combinationally in the accepting cycle.
    pub ack_latency: u32,
    /// Edges `stall` stays asserted after every accepted request.
    pub stall_after_accept: u32,
}

#[derive(Debug, Clone, Copy)]
struct Pending {
    ready_at: u64,
    data: u64,
    tag: u64,
}

/// Word-addressed memory behind a pipelined Wishbone slave port.
///
/// Responses come back in request order, one per cycle. Reads answer with
/// the request's address tag on `tgd_o`. Dropping `cyc` discards any
/// responses still owed.
#[derive(Debug, Default)]
pub struct MemorySlave {
    timing: SlaveTiming,
    mem: HashMap<u64, u64>,
    pending: VecDeque<Pending>,
    stall_left: u32,
    last_edge: Option<u64>,
    accepted: u64,
}

impl MemorySlave {
    pub fn new(timing: SlaveTiming) -> Self {
        Self {
            timing,
            ..Self::default()
        }
    }

    pub fn timing(&self) -> SlaveTiming {
        self.timing
    }

    pub fn peek(&self, addr: u64) -> u64 {
        *self.mem.get(&addr).unwrap_or(&0)
    }

    pub fn poke(&mut self, addr: u64, value: u64) {
        self.mem.insert(addr, value);
    }

    /// Requests accepted so far.
    pub fn accepted(&self) -> u64 {
        self.accepted
    }

    /// Responses accepted but not yet acknowledged.
    pub fn outstanding(&self) -> usize {
        self.pending.len()
    }

    fn write(&mut self, addr: u64, data: u64, sel: u64) {
        let lanes = (0..8)
            .filter(|lane| (sel >> lane) & 1 == 1)
            .fold(0u64, |acc, lane| acc | (0xff << (lane * 8)));
        let old = self.peek(addr);
        self.mem.insert(addr, (old & !lanes) | (data & lanes));
    }
}

impl Responder for MemorySlave {
    fn on_rising_edge(&mut self, bus: &BusSnapshot) {
        self.last_edge = Some(bus.edge);
        if bus.rst {
            self.pending.clear();
            self.stall_left = 0;
            return;
        }

        if !bus.req.cyc {
            self.pending.clear();
        } else if bus.rsp.ack && self.timing.ack_latency > 0 {
            self.pending.pop_front();
        }

        self.stall_left = self.stall_left.saturating_sub(1);

        if bus.req.cyc && bus.request_accepted() {
            let req = &bus.req;
            self.accepted += 1;
            let data = if req.we {
                self.write(req.adr, req.dat, req.sel);
                0
            } else {
                self.peek(req.adr)
            };
            trace!(
                "slave accepted {} {:#x} at edge {}",
                if req.we { "write" } else { "read" },
                req.adr,
                bus.edge
            );
            if self.timing.ack_latency > 0 {
                self.pending.push_back(Pending {
                    ready_at: bus.edge + u64::from(self.timing.ack_latency) - 1,
                    data,
                    tag: req.tga,
                });
            }
            self.stall_left = self.timing.stall_after_accept;
        }
    }

    fn settle(&mut self, rst: bool, req: &RequesterSignals) -> ResponderSignals {
        if rst {
            return ResponderSignals::default();
        }
        let stall = self.stall_left > 0;

        if self.timing.ack_latency == 0 {
            let ack = req.cyc && req.stb && !stall;
            return ResponderSignals {
                dat: if ack && !req.we { self.peek(req.adr) } else { 0 },
                ack,
                stall,
                tgd: if ack { req.tga } else { 0 },
            };
        }

        match (self.pending.front(), self.last_edge) {
            (Some(p), Some(edge)) if p.ready_at <= edge && req.cyc => ResponderSignals {
                dat: p.data,
                ack: true,
                stall,
                tgd: p.tag,
            },
            _ => ResponderSignals {
                stall,
                ..ResponderSignals::default()
            },
        }
    }
}
