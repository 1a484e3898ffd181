//! Protocol engine for verifying a Wishbone B4 pipelined slave: transaction
//! records, a requester-side driver, requester- and responder-side monitors,
//! single-access stimulus sequences, and a clock kernel to run them against
//! a responder model or an RTL device.

pub mod config;
pub mod driver;
pub mod monitor;
pub mod record;
pub mod responder;
#[cfg(feature = "verilator")]
pub mod rtl;
pub mod sequence;
pub mod signals;
pub mod testbench;
pub mod transport;

pub use config::{AgentConfig, Config};
pub use driver::{Driver, DriverState, StrobePolicy};
pub use monitor::{Monitor, MonitorState, Vantage};
pub use record::{RecordBuilder, TransactionRecord};
pub use responder::{MemorySlave, Responder, SlaveTiming};
pub use sequence::{
    Direction, Sequence, SingleAccessSequence, SingleReadSequence, SingleWriteSequence,
};
pub use signals::{BusSnapshot, BusWidths, RequesterSignals, ResponderSignals, SignalMap};
pub use testbench::{AgentHandles, Testbench};
pub use transport::{
    seq_item_channel, stop_channel, AnalysisPort, ItemStatus, ItemTicket, SeqItem, SeqItemPort,
    Sequencer, StopHandle, StopToken,
};
