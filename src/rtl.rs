//! Verilator-compiled RTL responder, enabled with the `verilator` feature.

use camino::Utf8Path;
use eyre::{eyre, Result};
use marlin::{
    verilator::{VerilatorRuntime, VerilatorRuntimeOptions},
    verilog::prelude::*,
};

use crate::responder::Responder;
use crate::signals::{BusSnapshot, RequesterSignals, ResponderSignals};

#[verilog(src = "rtl/wb4_slave.sv", name = "wb4_slave")]
pub struct Wb4SlaveRtl;

pub fn create_wb4_runtime() -> Result<VerilatorRuntime> {
    let include_paths = [Utf8Path::new("rtl")];
    let src_files = [Utf8Path::new("rtl/wb4_slave.sv")];

    VerilatorRuntime::new(
        Utf8Path::new("artifacts"),
        &src_files,
        &include_paths,
        [],
        VerilatorRuntimeOptions::default_logging(),
    )
    .map_err(|e| eyre!("Failed to create runtime: {}", e))
}

/// [`Responder`] backed by the `wb4_slave` RTL model.
pub struct RtlSlave<'ctx> {
    model: Wb4SlaveRtl<'ctx>,
}

impl<'ctx> RtlSlave<'ctx> {
    pub fn new(runtime: &'ctx VerilatorRuntime) -> Result<Self> {
        let mut model = runtime
            .create_model_simple::<Wb4SlaveRtl>()
            .map_err(|e| eyre!("Failed to create wb4_slave model: {:?}", e))?;
        model.clk_i = 0;
        model.rst_i = 1;
        model.eval();
        Ok(Self { model })
    }
}

impl Responder for RtlSlave<'_> {
    fn on_rising_edge(&mut self, _bus: &BusSnapshot) {
        // Inputs already hold the pre-edge values from the last settle.
        self.model.clk_i = 1;
        self.model.eval();
        self.model.clk_i = 0;
        self.model.eval();
    }

    fn settle(&mut self, rst: bool, req: &RequesterSignals) -> ResponderSignals {
        let m = &mut self.model;
        m.rst_i = rst as u8;
        m.cyc_i = req.cyc as u8;
        m.stb_i = req.stb as u8;
        m.we_i = req.we as u8;
        m.adr_i = req.adr as u32;
        m.dat_i = req.dat as u32;
        m.sel_i = (req.sel & 0xf) as u8;
        m.tga_i = req.tga as u8;
        m.tgd_i = req.tgd as u8;
        m.tgc_i = req.tgc as u8;
        m.eval();

        ResponderSignals {
            dat: u64::from(m.dat_o),
            ack: m.ack_o != 0,
            stall: m.stall_o != 0,
            tgd: u64::from(m.tgd_o),
        }
    }
}
