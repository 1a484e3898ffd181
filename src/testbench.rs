//! Clock kernel tying the driver, the monitors and a responder to one link.
//!
//! Every rising edge samples one [`BusSnapshot`], lets each component react
//! to it, and only then commits the new requester bundle and settles the
//! responder. Nothing written during an edge is visible before the next one.

use eyre::Result;
use log::{info, trace};
use tokio::sync::mpsc;

use crate::config::Config;
use crate::driver::Driver;
use crate::monitor::Monitor;
use crate::record::TransactionRecord;
use crate::responder::Responder;
use crate::signals::{BusSnapshot, RequesterSignals, ResponderSignals, SignalMap};
use crate::transport::{seq_item_channel, Sequencer, StopToken};

/// Endpoints of the agent built by [`Testbench::from_config`].
#[derive(Debug, Default)]
pub struct AgentHandles {
    pub sequencer: Option<Sequencer>,
    pub analysis: Option<mpsc::UnboundedReceiver<TransactionRecord>>,
}

pub struct Testbench<R: Responder> {
    edge: u64,
    rst: bool,
    req: RequesterSignals,
    rsp: ResponderSignals,
    driver: Option<Driver>,
    monitors: Vec<Monitor>,
    responder: R,
    signals: SignalMap,
}

impl<R: Responder> Testbench<R> {
    pub fn new(mut responder: R) -> Self {
        let req = RequesterSignals::default();
        let rsp = responder.settle(false, &req);
        Self {
            edge: 0,
            rst: false,
            req,
            rsp,
            driver: None,
            monitors: Vec::new(),
            responder,
            signals: SignalMap::default(),
        }
    }

    /// Builds the agent the configuration asks for around `responder`.
    pub fn from_config(config: &Config, responder: R) -> Result<(Self, AgentHandles)> {
        config.validate()?;
        let agent = &config.agent;
        let mut tb = Self::new(responder).with_signal_map(config.signals.clone());
        let mut handles = AgentHandles::default();

        if agent.has_driver {
            let (sequencer, port) = seq_item_channel();
            let driver = Driver::new(&agent.name, port)
                .with_widths(config.bus)
                .with_policy(agent.strobe_policy);
            tb = tb.with_driver(driver);
            handles.sequencer = Some(sequencer);
        }
        if agent.has_monitor {
            let mut monitor = Monitor::new(&agent.name, agent.vantage);
            handles.analysis = Some(monitor.subscribe());
            tb = tb.with_monitor(monitor);
        }

        info!(
            "agent {}: driver={} monitor={} vantage={:?}",
            agent.name, agent.has_driver, agent.has_monitor, agent.vantage
        );
        Ok((tb, handles))
    }

    pub fn with_driver(mut self, driver: Driver) -> Self {
        self.driver = Some(driver);
        self
    }

    pub fn with_monitor(mut self, monitor: Monitor) -> Self {
        self.monitors.push(monitor);
        self
    }

    pub fn with_signal_map(mut self, signals: SignalMap) -> Self {
        self.signals = signals;
        self
    }

    /// Rising edges elapsed so far; also the index of the next edge.
    pub fn edge(&self) -> u64 {
        self.edge
    }

    pub fn driver(&self) -> Option<&Driver> {
        self.driver.as_ref()
    }

    pub fn monitors(&self) -> &[Monitor] {
        &self.monitors
    }

    pub fn monitor_mut(&mut self, index: usize) -> Option<&mut Monitor> {
        self.monitors.get_mut(index)
    }

    pub fn responder(&self) -> &R {
        &self.responder
    }

    pub fn responder_mut(&mut self) -> &mut R {
        &mut self.responder
    }

    /// Drives the synchronous reset line; sampled from the next edge on.
    pub fn set_reset(&mut self, rst: bool) {
        self.rst = rst;
        self.rsp = self.responder.settle(self.rst, &self.req);
    }

    /// What the next rising edge will sample.
    pub fn snapshot(&self) -> BusSnapshot {
        BusSnapshot {
            edge: self.edge,
            rst: self.rst,
            req: self.req,
            rsp: self.rsp,
        }
    }

    /// Performs one rising edge and returns the values it sampled.
    pub fn step(&mut self) -> BusSnapshot {
        let sampled = self.snapshot();
        trace!("edge {}: {}", sampled.edge, sampled.describe(&self.signals));

        for monitor in &mut self.monitors {
            monitor.on_rising_edge(&sampled);
        }
        let next = match &mut self.driver {
            Some(driver) => driver.on_rising_edge(&sampled),
            None => self.req,
        };
        self.responder.on_rising_edge(&sampled);

        self.req = next;
        self.rsp = self.responder.settle(self.rst, &self.req);
        self.edge += 1;
        sampled
    }

    pub fn run_for(&mut self, edges: u64) {
        for _ in 0..edges {
            self.step();
        }
    }

    /// Holds reset for `edges` rising edges, then releases it.
    pub fn reset_for(&mut self, edges: u64) {
        self.set_reset(true);
        self.run_for(edges);
        self.set_reset(false);
    }

    /// Steps until `done` holds after an edge, for at most `max_edges`.
    /// Returns the number of edges taken, or `None` if `done` never held.
    pub fn run_until(&mut self, max_edges: u64, mut done: impl FnMut(&Self) -> bool) -> Option<u64> {
        for taken in 1..=max_edges {
            self.step();
            if done(self) {
                return Some(taken);
            }
        }
        None
    }

    /// Runs the clock until `stop` fires, yielding to the runtime after
    /// every edge so sequences and subscribers can make progress.
    pub async fn run(&mut self, stop: &StopToken) -> u64 {
        let start = self.edge;
        while !stop.is_stopped() {
            self.step();
            tokio::task::yield_now().await;
        }
        info!("clock stopped after {} edges", self.edge - start);
        self.edge - start
    }
}
