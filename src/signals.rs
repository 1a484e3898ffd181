//! Signal interface binding for a Wishbone B4 pipelined link.
//!
//! The link is split into two disjoint bundles. The requester (driver)
//! owns [`RequesterSignals`], the responder (device under test) owns
//! [`ResponderSignals`]. Monitors never hold either; they receive a
//! [`BusSnapshot`] taken once per rising edge.

use std::collections::HashSet;

use eyre::{bail, Result};
use serde::Deserialize;

/// Requester to responder lines (`*_i` from the slave's point of view).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RequesterSignals {
    pub cyc: bool,
    pub stb: bool,
    pub we: bool,
    pub adr: u64,
    /// Write data.
    pub dat: u64,
    pub sel: u64,
    pub tga: u64,
    pub tgd: u64,
    pub tgc: u64,
}

/// Responder to requester lines (`*_o` from the slave's point of view).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResponderSignals {
    /// Read data.
    pub dat: u64,
    pub ack: bool,
    pub stall: bool,
    pub tgd: u64,
}

/// Values of every line as sampled at one rising clock edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BusSnapshot {
    /// Index of the rising edge, counted from zero.
    pub edge: u64,
    pub rst: bool,
    pub req: RequesterSignals,
    pub rsp: ResponderSignals,
}

impl BusSnapshot {
    /// A request is presented and not stalled.
    pub fn request_accepted(&self) -> bool {
        self.req.stb && !self.rsp.stall
    }

    /// Renders the snapshot with the bound signal names.
    pub fn describe(&self, map: &SignalMap) -> String {
        format!(
            "{}={} {}={} {}={} {}={} {}={:#x} {}={:#x} {}={:#x} {}={:#x} {}={:#x} {}={:#x} {}={} {}={} {}={:#x}",
            map.rst, self.rst as u8,
            map.cyc, self.req.cyc as u8,
            map.stb, self.req.stb as u8,
            map.we, self.req.we as u8,
            map.addr, self.req.adr,
            map.dat_in, self.req.dat,
            map.sel, self.req.sel,
            map.tga, self.req.tga,
            map.tgd_in, self.req.tgd,
            map.tgc, self.req.tgc,
            map.ack, self.rsp.ack as u8,
            map.stall, self.rsp.stall as u8,
            map.dat_out, self.rsp.dat,
        )
    }
}

/// Concrete signal names for each logical role of the link.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SignalMap {
    pub clk: String,
    pub rst: String,
    pub cyc: String,
    pub stb: String,
    pub dat_in: String,
    pub dat_out: String,
    pub addr: String,
    pub we: String,
    pub sel: String,
    pub stall: String,
    pub ack: String,
    pub tga: String,
    pub tgd_in: String,
    pub tgd_out: String,
    pub tgc: String,
}

impl Default for SignalMap {
    fn default() -> Self {
        Self {
            clk: "clk_i".into(),
            rst: "rst_i".into(),
            cyc: "cyc_i".into(),
            stb: "stb_i".into(),
            dat_in: "dat_i".into(),
            dat_out: "dat_o".into(),
            addr: "adr_i".into(),
            we: "we_i".into(),
            sel: "sel_i".into(),
            stall: "stall_o".into(),
            ack: "ack_o".into(),
            tga: "tga_i".into(),
            tgd_in: "tgd_i".into(),
            tgd_out: "tgd_o".into(),
            tgc: "tgc_i".into(),
        }
    }
}

impl SignalMap {
    fn names(&self) -> [(&'static str, &str); 15] {
        [
            ("clk", self.clk.as_str()),
            ("rst", self.rst.as_str()),
            ("cyc", self.cyc.as_str()),
            ("stb", self.stb.as_str()),
            ("dat_in", self.dat_in.as_str()),
            ("dat_out", self.dat_out.as_str()),
            ("addr", self.addr.as_str()),
            ("we", self.we.as_str()),
            ("sel", self.sel.as_str()),
            ("stall", self.stall.as_str()),
            ("ack", self.ack.as_str()),
            ("tga", self.tga.as_str()),
            ("tgd_in", self.tgd_in.as_str()),
            ("tgd_out", self.tgd_out.as_str()),
            ("tgc", self.tgc.as_str()),
        ]
    }

    /// Every role needs its own, non-empty name.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for (role, name) in self.names() {
            if name.trim().is_empty() {
                bail!("signal role `{}` is bound to an empty name", role);
            }
            if !seen.insert(name) {
                bail!("signal name `{}` is bound to more than one role", name);
            }
        }
        Ok(())
    }
}

/// Wire widths in bits. Values driven onto a line are truncated to its width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BusWidths {
    pub address: u32,
    pub data: u32,
    pub select: u32,
    pub tag: u32,
}

impl Default for BusWidths {
    fn default() -> Self {
        Self {
            address: 32,
            data: 32,
            select: 4,
            tag: 8,
        }
    }
}

impl BusWidths {
    pub fn validate(&self) -> Result<()> {
        for (name, width) in [
            ("address", self.address),
            ("data", self.data),
            ("select", self.select),
            ("tag", self.tag),
        ] {
            if width == 0 || width > 64 {
                bail!("{} width must be within 1..=64 bits, got {}", name, width);
            }
        }
        Ok(())
    }

    /// Truncates every field of a requester bundle to its wire width.
    pub fn fit(&self, req: RequesterSignals) -> RequesterSignals {
        RequesterSignals {
            adr: req.adr & mask(self.address),
            dat: req.dat & mask(self.data),
            sel: req.sel & mask(self.select),
            tga: req.tga & mask(self.tag),
            tgd: req.tgd & mask(self.tag),
            tgc: req.tgc & mask(self.tag),
            ..req
        }
    }
}

fn mask(bits: u32) -> u64 {
    if bits >= 64 {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    }
}
