//! Hand-off channels around the protocol engine: sequences to driver,
//! monitors to subscribers, and per-loop stop signals.

use eyre::{eyre, Result};
use log::trace;
use tokio::sync::{mpsc, oneshot, watch};

use crate::record::TransactionRecord;

/// How the driver disposed of a submitted record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemStatus {
    /// The responder accepted the presented request at `edge`.
    Completed { edge: u64 },
    /// Reset asserted at `edge` while the record was still being fed.
    AbortedByReset { edge: u64 },
}

/// A record in flight between a sequencer and the driver.
#[derive(Debug)]
pub struct SeqItem {
    record: TransactionRecord,
    done: oneshot::Sender<ItemStatus>,
}

impl SeqItem {
    pub fn record(&self) -> &TransactionRecord {
        &self.record
    }

    /// Tells the producer the item is finished. A producer that stopped
    /// waiting is not an error.
    pub fn item_done(self, status: ItemStatus) {
        let _ = self.done.send(status);
    }
}

/// Completion handle returned by [`Sequencer::submit`].
#[derive(Debug)]
pub struct ItemTicket {
    done: oneshot::Receiver<ItemStatus>,
    status: Option<ItemStatus>,
}

impl ItemTicket {
    pub async fn wait(self) -> Result<ItemStatus> {
        if let Some(status) = self.status {
            return Ok(status);
        }
        self.done
            .await
            .map_err(|_| eyre!("driver dropped the item before finishing it"))
    }

    /// Non-blocking check, for callers stepping the clock themselves.
    pub fn try_status(&mut self) -> Option<ItemStatus> {
        if self.status.is_none() {
            self.status = self.done.try_recv().ok();
        }
        self.status
    }
}

/// Producer side of the driver's transport queue.
#[derive(Debug, Clone)]
pub struct Sequencer {
    tx: mpsc::UnboundedSender<SeqItem>,
}

impl Sequencer {
    pub fn submit(&self, record: TransactionRecord) -> Result<ItemTicket> {
        let (done, rx) = oneshot::channel();
        self.tx
            .send(SeqItem { record, done })
            .map_err(|_| eyre!("no driver is attached to this sequencer"))?;
        trace!("sequencer queued {}", record);
        Ok(ItemTicket {
            done: rx,
            status: None,
        })
    }
}

/// Consumer side of the transport queue, owned by the driver.
#[derive(Debug)]
pub struct SeqItemPort {
    rx: mpsc::UnboundedReceiver<SeqItem>,
}

impl SeqItemPort {
    // an empty or closed queue just means idle
    pub fn try_next_item(&mut self) -> Option<SeqItem> {
        self.rx.try_recv().ok()
    }
}

pub fn seq_item_channel() -> (Sequencer, SeqItemPort) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Sequencer { tx }, SeqItemPort { rx })
}

/// Ordered fan-out of captured records.
#[derive(Debug, Default)]
pub struct AnalysisPort {
    subscribers: Vec<mpsc::UnboundedSender<TransactionRecord>>,
}

impl AnalysisPort {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<TransactionRecord> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    // dead subscribers are dropped here
    pub fn write(&mut self, record: TransactionRecord) {
        self.subscribers.retain(|sub| sub.send(record).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

/// Requests that one or more loops stop.
#[derive(Debug)]
pub struct StopHandle {
    tx: watch::Sender<bool>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.tx.send_replace(true);
    }

    pub fn token(&self) -> StopToken {
        StopToken {
            rx: self.tx.subscribe(),
        }
    }
}

/// Observed by a loop on every edge.
#[derive(Debug, Clone)]
pub struct StopToken {
    rx: watch::Receiver<bool>,
}

impl StopToken {
    pub fn is_stopped(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once stop is requested, or the handle is gone.
    pub async fn stopped(&mut self) {
        let _ = self.rx.wait_for(|stop| *stop).await;
    }
}

pub fn stop_channel() -> (StopHandle, StopToken) {
    let (tx, rx) = watch::channel(false);
    (StopHandle { tx }, StopToken { rx })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RecordBuilder;

    #[tokio::test]
    async fn test_items_arrive_in_order_and_report_done() {
        let (sequencer, mut port) = seq_item_channel();
        let first = sequencer.submit(RecordBuilder::new().address(1).build()).unwrap();
        let _second = sequencer.submit(RecordBuilder::new().address(2).build()).unwrap();

        let item = port.try_next_item().unwrap();
        assert_eq!(item.record().address(), 1);
        item.item_done(ItemStatus::Completed { edge: 4 });
        assert_eq!(first.wait().await.unwrap(), ItemStatus::Completed { edge: 4 });

        assert_eq!(port.try_next_item().unwrap().record().address(), 2);
        assert!(port.try_next_item().is_none());
    }

    #[test]
    fn test_ticket_status_is_sticky() {
        let (sequencer, mut port) = seq_item_channel();
        let mut ticket = sequencer.submit(RecordBuilder::new().build()).unwrap();
        assert!(ticket.try_status().is_none());
        port.try_next_item()
            .unwrap()
            .item_done(ItemStatus::AbortedByReset { edge: 2 });
        let status = Some(ItemStatus::AbortedByReset { edge: 2 });
        assert_eq!(ticket.try_status(), status);
        assert_eq!(ticket.try_status(), status);
    }

    #[tokio::test]
    async fn test_dropped_item_is_an_error_for_the_waiter() {
        let (sequencer, mut port) = seq_item_channel();
        let ticket = sequencer.submit(RecordBuilder::new().build()).unwrap();
        drop(port.try_next_item());
        assert!(ticket.wait().await.is_err());
    }

    #[test]
    fn test_submit_without_driver_fails() {
        let (sequencer, port) = seq_item_channel();
        drop(port);
        assert!(sequencer.submit(RecordBuilder::new().build()).is_err());
    }

    #[test]
    fn test_analysis_port_fans_out_and_prunes() {
        let mut ap = AnalysisPort::new();
        let mut a = ap.subscribe();
        let b = ap.subscribe();
        drop(b);

        let record = RecordBuilder::new().address(0x40).build();
        ap.write(record);
        assert_eq!(ap.subscriber_count(), 1);
        assert_eq!(a.try_recv().unwrap(), record);
        assert!(a.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_stop_token_observes_handle() {
        let (handle, mut token) = stop_channel();
        let other = handle.token();
        assert!(!token.is_stopped());
        handle.stop();
        token.stopped().await;
        assert!(other.is_stopped());
    }
}
