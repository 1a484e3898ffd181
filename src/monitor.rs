//! Passive bus monitor.
//!
//! One capture engine serves both ends of the link; a [`Vantage`] selects
//! the acceptance condition, when a read may end without its `ack` and which
//! data tag ends up in the record.
//!
//! Responses arrive in request order, so every accepted request takes a
//! slot in a queue and each sampled `ack` answers the oldest slot. Writes
//! are published when accepted and keep their slot only to consume their
//! own `ack`; reads are published when that `ack` arrives.

use std::collections::VecDeque;

use log::{debug, trace};
use serde::Deserialize;
use tokio::sync::mpsc;

use crate::record::{RecordBuilder, TransactionRecord};
use crate::signals::BusSnapshot;
use crate::transport::{AnalysisPort, StopToken};

/// Which end of the link the monitor watches from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Vantage {
    /// Next to the requester. Accepts on `stb && !stall` and keeps the
    /// outgoing data tag for writes.
    Requester,
    /// Next to the responder. Accepts on `cyc && stb && !stall`, ends every
    /// outstanding read when `cyc` drops, and always records the response tag.
    Responder,
}

impl Vantage {
    fn accepts(self, bus: &BusSnapshot) -> bool {
        match self {
            Vantage::Requester => bus.request_accepted(),
            Vantage::Responder => bus.req.cyc && bus.request_accepted(),
        }
    }

    fn response_tag(self, read: bool) -> bool {
        match self {
            Vantage::Requester => read,
            Vantage::Responder => true,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Vantage::Requester => "requester",
            Vantage::Responder => "responder",
        }
    }
}

#[derive(Debug, Clone)]
struct Outstanding {
    since: u64,
    // None for writes, which were published on acceptance
    read: Option<RecordBuilder>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Idle,
    /// `outstanding` accepted requests still wait for `ack`; the oldest was
    /// accepted at `since`.
    AwaitingResponse { since: u64, outstanding: usize },
    Stopped,
}

pub struct Monitor {
    tag: String,
    vantage: Vantage,
    outstanding: VecDeque<Outstanding>,
    ap: AnalysisPort,
    num_items: u64,
    stop: Option<StopToken>,
    stopped: bool,
}

impl Monitor {
    pub fn new(name: &str, vantage: Vantage) -> Self {
        Self {
            tag: format!("wb4_{}_monitor_{}", vantage.name(), name),
            vantage,
            outstanding: VecDeque::new(),
            ap: AnalysisPort::new(),
            num_items: 0,
            stop: None,
            stopped: false,
        }
    }

    pub fn with_stop(mut self, stop: StopToken) -> Self {
        self.stop = Some(stop);
        self
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn vantage(&self) -> Vantage {
        self.vantage
    }

    pub fn num_items(&self) -> u64 {
        self.num_items
    }

    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<TransactionRecord> {
        self.ap.subscribe()
    }

    pub fn analysis_port(&mut self) -> &mut AnalysisPort {
        &mut self.ap
    }

    pub fn state(&self) -> MonitorState {
        if self.stopped {
            return MonitorState::Stopped;
        }
        match self.outstanding.front() {
            None => MonitorState::Idle,
            Some(oldest) => MonitorState::AwaitingResponse {
                since: oldest.since,
                outstanding: self.outstanding.len(),
            },
        }
    }

    /// Samples the bus at one rising edge and publishes, in order, every
    /// record that completes on it.
    pub fn on_rising_edge(&mut self, bus: &BusSnapshot) -> Vec<TransactionRecord> {
        if self.stopped || self.stop.as_ref().is_some_and(StopToken::is_stopped) {
            if !self.stopped {
                debug!("{}: stopped after {} items", self.tag, self.num_items);
            }
            self.stopped = true;
            self.outstanding.clear();
            return Vec::new();
        }

        if bus.rst {
            // nothing owed before reset is ever answered
            self.outstanding.clear();
            return Vec::new();
        }

        let mut finished = Vec::new();
        let older_waiting = !self.outstanding.is_empty();

        if self.vantage == Vantage::Responder && !bus.req.cyc {
            // cycle dropped: whatever is still owed will never come
            let mut acked = bus.rsp.ack;
            while let Some(slot) = self.outstanding.pop_front() {
                if let Some(partial) = slot.read {
                    finished.push(self.finish(partial, bus, acked));
                }
                acked = false;
            }
        } else if bus.rsp.ack {
            if let Some(slot) = self.outstanding.pop_front() {
                if let Some(partial) = slot.read {
                    finished.push(self.finish(partial, bus, true));
                }
            }
        }

        if self.vantage.accepts(bus) {
            let partial = capture_request(bus);
            trace!("{}: request accepted at edge {}", self.tag, bus.edge);
            // this edge's ack belongs to an older request if one was waiting
            let acked = bus.rsp.ack && !older_waiting;
            let read = partial.is_read();

            if acked {
                finished.push(self.finish(partial, bus, true));
            } else if read {
                self.outstanding.push_back(Outstanding {
                    since: bus.edge,
                    read: Some(partial),
                });
            } else {
                finished.push(self.finish(partial, bus, false));
                self.outstanding.push_back(Outstanding {
                    since: bus.edge,
                    read: None,
                });
            }
        }

        for record in &finished {
            self.num_items += 1;
            self.ap.write(*record);
            debug!("{}: {}", self.tag, record);
        }
        finished
    }

    fn finish(&self, partial: RecordBuilder, bus: &BusSnapshot, acked: bool) -> TransactionRecord {
        let read = partial.is_read();
        let partial = if self.vantage.response_tag(read) {
            partial.data_tag(bus.rsp.tgd)
        } else {
            partial
        };
        partial
            .data_out(bus.rsp.dat)
            .stall(bus.rsp.stall)
            .acknowledge(acked)
            .build()
    }
}

fn capture_request(bus: &BusSnapshot) -> RecordBuilder {
    let req = &bus.req;
    RecordBuilder::new()
        .address(req.adr)
        .data_in(req.dat)
        .select(req.sel)
        .write_enable(req.we)
        .cycle(req.cyc)
        .strobe(req.stb)
        .address_tag(req.tga)
        .data_tag(req.tgd)
        .cycle_tag(req.tgc)
}
