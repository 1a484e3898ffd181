//! Transaction records exchanged between sequences, the driver and the monitors.

use std::fmt;

/// One bus cycle's request and response fields.
///
/// Records are only ever produced through a [`RecordBuilder`]: sequences
/// populate the request side, monitors fill both sides across one or more
/// clock edges. Once built, a record is a plain value and is never
/// modified again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransactionRecord {
    address: u64,
    data_in: u64,
    data_out: u64,
    select: u64,
    write_enable: bool,
    strobe: bool,
    cycle: bool,
    acknowledge: bool,
    stall: bool,
    address_tag: u64,
    data_tag: u64,
    cycle_tag: u64,
    transmit_delay: u32,
}

impl TransactionRecord {
    pub fn address(&self) -> u64 {
        self.address
    }

    /// Write payload (requester to responder).
    pub fn data_in(&self) -> u64 {
        self.data_in
    }

    /// Read payload (responder to requester).
    pub fn data_out(&self) -> u64 {
        self.data_out
    }

    /// Byte-lane mask.
    pub fn select(&self) -> u64 {
        self.select
    }

    pub fn write_enable(&self) -> bool {
        self.write_enable
    }

    pub fn is_read(&self) -> bool {
        !self.write_enable
    }

    pub fn strobe(&self) -> bool {
        self.strobe
    }

    pub fn cycle(&self) -> bool {
        self.cycle
    }

    pub fn acknowledge(&self) -> bool {
        self.acknowledge
    }

    pub fn stall(&self) -> bool {
        self.stall
    }

    pub fn address_tag(&self) -> u64 {
        self.address_tag
    }

    pub fn data_tag(&self) -> u64 {
        self.data_tag
    }

    pub fn cycle_tag(&self) -> u64 {
        self.cycle_tag
    }

    /// Idle clock edges the driver waits before presenting this request.
    pub fn transmit_delay(&self) -> u32 {
        self.transmit_delay
    }

    /// Whether two captures describe the same logical transaction.
    ///
    /// Compares the request fields both sides of the link can see, plus the
    /// read payload for reads. Handshake and tag values on the response side
    /// are vantage dependent and are not compared.
    pub fn same_request(&self, other: &TransactionRecord) -> bool {
        let request = self.address == other.address
            && self.data_in == other.data_in
            && self.select == other.select
            && self.write_enable == other.write_enable
            && self.address_tag == other.address_tag
            && self.cycle_tag == other.cycle_tag;

        if self.is_read() {
            request && self.data_out == other.data_out
        } else {
            request
        }
    }
}

impl fmt::Display for TransactionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} adr={:#x} dat_i={:#x} dat_o={:#x} sel={:#x} cyc={} stb={} ack={} stall={} tga={:#x} tgd={:#x} tgc={:#x} delay={}",
            if self.write_enable { "WR" } else { "RD" },
            self.address,
            self.data_in,
            self.data_out,
            self.select,
            self.cycle as u8,
            self.strobe as u8,
            self.acknowledge as u8,
            self.stall as u8,
            self.address_tag,
            self.data_tag,
            self.cycle_tag,
            self.transmit_delay,
        )
    }
}

/// Progressive construction of a [`TransactionRecord`].
///
/// Every field starts at zero. `write_enable` is only settable inside the
/// crate: sequences fix it per variant and monitors copy the sampled value.
#[derive(Debug, Clone, Default)]
pub struct RecordBuilder {
    record: TransactionRecord,
}

impl RecordBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn address(mut self, address: u64) -> Self {
        self.record.address = address;
        self
    }

    pub fn data_in(mut self, data: u64) -> Self {
        self.record.data_in = data;
        self
    }

    pub fn data_out(mut self, data: u64) -> Self {
        self.record.data_out = data;
        self
    }

    pub fn select(mut self, select: u64) -> Self {
        self.record.select = select;
        self
    }

    pub(crate) fn write_enable(mut self, write_enable: bool) -> Self {
        self.record.write_enable = write_enable;
        self
    }

    pub fn strobe(mut self, strobe: bool) -> Self {
        self.record.strobe = strobe;
        self
    }

    pub fn cycle(mut self, cycle: bool) -> Self {
        self.record.cycle = cycle;
        self
    }

    pub fn acknowledge(mut self, acknowledge: bool) -> Self {
        self.record.acknowledge = acknowledge;
        self
    }

    pub fn stall(mut self, stall: bool) -> Self {
        self.record.stall = stall;
        self
    }

    pub fn address_tag(mut self, tag: u64) -> Self {
        self.record.address_tag = tag;
        self
    }

    pub fn data_tag(mut self, tag: u64) -> Self {
        self.record.data_tag = tag;
        self
    }

    pub fn cycle_tag(mut self, tag: u64) -> Self {
        self.record.cycle_tag = tag;
        self
    }

    pub fn transmit_delay(mut self, delay: u32) -> Self {
        self.record.transmit_delay = delay;
        self
    }

    pub(crate) fn is_read(&self) -> bool {
        !self.record.write_enable
    }

    pub fn build(self) -> TransactionRecord {
        self.record
    }
}
