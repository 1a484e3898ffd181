//! Stimulus driver for the requester side of the link.
//!
//! The driver consumes records from its [`SeqItemPort`] and presents each on
//! the bus after the record's transmit delay. A presented request stays on
//! the bus until an edge samples `stall` low; only then is the item done and
//! the next record taken, so at most one request is being issued at a time
//! even though the protocol is pipelined.

use log::{debug, trace};
use serde::Deserialize;
use tokio::sync::watch;

use crate::record::TransactionRecord;
use crate::signals::{BusSnapshot, BusWidths, RequesterSignals};
use crate::transport::{ItemStatus, SeqItem, SeqItemPort, StopToken};

/// What the driver presents while it has nothing new to issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrobePolicy {
    /// Leave the last record on the bus, strobe included. The responder
    /// sees it as a new request on every following edge.
    Hold,
    /// Withdraw `stb` once the presented request is accepted and nothing
    /// new is ready to go out on the same edge.
    #[default]
    ReleaseWhenAccepted,
}

enum Phase {
    Reset,
    Idle,
    Delaying { item: SeqItem, remaining: u32 },
    Presented { item: SeqItem },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Reset,
    Idle,
    Delaying { remaining: u32 },
    /// A request is on the bus and has not been accepted yet.
    Presented,
}

pub struct Driver {
    tag: String,
    port: SeqItemPort,
    widths: BusWidths,
    policy: StrobePolicy,
    phase: Phase,
    out: RequesterSignals,
    items_done: u64,
    completed: watch::Sender<u64>,
    stop: Option<StopToken>,
}

impl Driver {
    pub fn new(name: &str, port: SeqItemPort) -> Self {
        let (completed, _) = watch::channel(0);
        Self {
            tag: format!("wb4_driver_{}", name),
            port,
            widths: BusWidths::default(),
            policy: StrobePolicy::default(),
            phase: Phase::Reset,
            out: RequesterSignals::default(),
            items_done: 0,
            completed,
            stop: None,
        }
    }

    pub fn with_widths(mut self, widths: BusWidths) -> Self {
        self.widths = widths;
        self
    }

    pub fn with_policy(mut self, policy: StrobePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Once stopped the driver finishes the item in hand and takes no more.
    pub fn with_stop(mut self, stop: StopToken) -> Self {
        self.stop = Some(stop);
        self
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn state(&self) -> DriverState {
        match &self.phase {
            Phase::Reset => DriverState::Reset,
            Phase::Idle => DriverState::Idle,
            Phase::Delaying { remaining, .. } => DriverState::Delaying {
                remaining: *remaining,
            },
            Phase::Presented { .. } => DriverState::Presented,
        }
    }

    pub fn outputs(&self) -> RequesterSignals {
        self.out
    }

    pub fn items_done(&self) -> u64 {
        self.items_done
    }

    /// Fires with the running count each time an item completes.
    pub fn completions(&self) -> watch::Receiver<u64> {
        self.completed.subscribe()
    }

    pub fn on_rising_edge(&mut self, bus: &BusSnapshot) -> RequesterSignals {
        if bus.rst {
            self.reset_signals(bus.edge);
            return self.out;
        }

        self.phase = match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Reset | Phase::Idle => self.get_and_drive(bus),
            Phase::Delaying { item, remaining } => {
                if remaining <= 1 {
                    self.feed_data(item, bus)
                } else {
                    Phase::Delaying {
                        item,
                        remaining: remaining - 1,
                    }
                }
            }
            Phase::Presented { item } => {
                if bus.rsp.stall {
                    Phase::Presented { item }
                } else {
                    self.item_done(item, ItemStatus::Completed { edge: bus.edge });
                    if self.policy == StrobePolicy::ReleaseWhenAccepted {
                        self.out.stb = false;
                    }
                    self.get_and_drive(bus)
                }
            }
        };
        self.out
    }

    fn get_and_drive(&mut self, bus: &BusSnapshot) -> Phase {
        if self.stop.as_ref().is_some_and(StopToken::is_stopped) {
            return Phase::Idle;
        }
        let Some(item) = self.port.try_next_item() else {
            return Phase::Idle;
        };
        trace!("{}: got {} at edge {}", self.tag, item.record(), bus.edge);

        match item.record().transmit_delay() {
            0 => self.feed_data(item, bus),
            delay => Phase::Delaying {
                item,
                remaining: delay,
            },
        }
    }

    fn feed_data(&mut self, item: SeqItem, bus: &BusSnapshot) -> Phase {
        self.out = self.widths.fit(request_lines(item.record()));
        debug!("{}: presenting {} at edge {}", self.tag, item.record(), bus.edge);
        Phase::Presented { item }
    }

    fn reset_signals(&mut self, edge: u64) {
        match std::mem::replace(&mut self.phase, Phase::Reset) {
            Phase::Delaying { item, .. } | Phase::Presented { item } => {
                debug!("{}: reset abandoned {}", self.tag, item.record());
                item.item_done(ItemStatus::AbortedByReset { edge });
            }
            Phase::Reset | Phase::Idle => {}
        }
        self.out.stb = false;
        self.out.cyc = false;
    }

    fn item_done(&mut self, item: SeqItem, status: ItemStatus) {
        item.item_done(status);
        self.items_done += 1;
        self.completed.send_replace(self.items_done);
    }
}

fn request_lines(record: &TransactionRecord) -> RequesterSignals {
    RequesterSignals {
        cyc: record.cycle(),
        stb: record.strobe(),
        we: record.write_enable(),
        adr: record.address(),
        dat: record.data_in(),
        sel: record.select(),
        tga: record.address_tag(),
        tgd: record.data_tag(),
        tgc: record.cycle_tag(),
    }
}
