//! Single read and single write stimulus sequences.
//!
//! A sequence only copies caller-supplied fields into a fresh record and
//! hands it to a [`Sequencer`]. The direction is fixed by the sequence type.

use std::marker::PhantomData;

use eyre::Result;

use crate::record::{RecordBuilder, TransactionRecord};
use crate::transport::{ItemStatus, ItemTicket, Sequencer};

#[allow(async_fn_in_trait)]
pub trait Sequence {
    fn build(&self) -> TransactionRecord;

    /// Queues the record and returns without waiting for the driver.
    fn start(&self, sequencer: &Sequencer) -> Result<ItemTicket> {
        sequencer.submit(self.build())
    }

    /// Queues the record and waits until the driver is done with it.
    async fn run(&self, sequencer: &Sequencer) -> Result<ItemStatus> {
        self.start(sequencer)?.wait().await
    }
}

/// Transfer direction of a [`SingleAccessSequence`].
pub trait Direction {
    const WRITE_ENABLE: bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Read;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Write;

impl Direction for Read {
    const WRITE_ENABLE: bool = false;
}

impl Direction for Write {
    const WRITE_ENABLE: bool = true;
}

/// One read request (`we = 0`).
pub type SingleReadSequence = SingleAccessSequence<Read>;

/// One write request (`we = 1`).
pub type SingleWriteSequence = SingleAccessSequence<Write>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SingleAccessSequence<D> {
    address: u64,
    data: u64,
    select: u64,
    cycle: bool,
    strobe: bool,
    acknowledge: bool,
    address_tag: u64,
    data_tag: u64,
    cycle_tag: u64,
    transmit_delay: u32,
    direction: PhantomData<D>,
}

impl<D: Direction> Default for SingleAccessSequence<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: Direction> SingleAccessSequence<D> {
    /// Starts with `cyc` and `stb` asserted and everything else zero.
    pub fn new() -> Self {
        Self {
            address: 0,
            data: 0,
            select: 0,
            cycle: true,
            strobe: true,
            acknowledge: false,
            address_tag: 0,
            data_tag: 0,
            cycle_tag: 0,
            transmit_delay: 0,
            direction: PhantomData,
        }
    }

    pub fn address(mut self, address: u64) -> Self {
        self.address = address;
        self
    }

    pub fn data(mut self, data: u64) -> Self {
        self.data = data;
        self
    }

    pub fn select(mut self, select: u64) -> Self {
        self.select = select;
        self
    }

    pub fn cycle(mut self, cycle: bool) -> Self {
        self.cycle = cycle;
        self
    }

    pub fn strobe(mut self, strobe: bool) -> Self {
        self.strobe = strobe;
        self
    }

    // carried into the record only; never driven
    pub fn acknowledge(mut self, acknowledge: bool) -> Self {
        self.acknowledge = acknowledge;
        self
    }

    pub fn address_tag(mut self, tag: u64) -> Self {
        self.address_tag = tag;
        self
    }

    pub fn data_tag(mut self, tag: u64) -> Self {
        self.data_tag = tag;
        self
    }

    pub fn cycle_tag(mut self, tag: u64) -> Self {
        self.cycle_tag = tag;
        self
    }

    pub fn transmit_delay(mut self, delay: u32) -> Self {
        self.transmit_delay = delay;
        self
    }
}

impl<D: Direction> Sequence for SingleAccessSequence<D> {
    fn build(&self) -> TransactionRecord {
        RecordBuilder::new()
            .write_enable(D::WRITE_ENABLE)
            .address(self.address)
            .data_in(self.data)
            .select(self.select)
            .cycle(self.cycle)
            .strobe(self.strobe)
            .acknowledge(self.acknowledge)
            .address_tag(self.address_tag)
            .data_tag(self.data_tag)
            .cycle_tag(self.cycle_tag)
            .transmit_delay(self.transmit_delay)
            .build()
    }
}
