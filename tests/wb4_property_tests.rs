use proptest::prelude::*;

use wb4_vip::{
    seq_item_channel, BusSnapshot, Driver, ItemStatus, MemorySlave, Monitor, RequesterSignals,
    ResponderSignals, Sequence, Sequencer, SingleReadSequence, SingleWriteSequence, SlaveTiming,
    StrobePolicy, Testbench, Vantage,
};

/// Property testing helper: a driver and one monitor per vantage around a
/// memory responder.
struct Wb4PropertyHelper {
    tb: Testbench<MemorySlave>,
    sequencer: Sequencer,
}

impl Wb4PropertyHelper {
    fn new(timing: SlaveTiming) -> Self {
        let (sequencer, port) = seq_item_channel();
        let tb = Testbench::new(MemorySlave::new(timing))
            .with_driver(Driver::new("p", port).with_policy(StrobePolicy::ReleaseWhenAccepted))
            .with_monitor(Monitor::new("p", Vantage::Requester))
            .with_monitor(Monitor::new("p", Vantage::Responder));
        Self { tb, sequencer }
    }

    fn published(&self) -> u64 {
        self.tb.monitors().iter().map(Monitor::num_items).min().unwrap_or(0)
    }
}

// Property test generators

/// Arbitrary control-line combination on one edge
fn control_lines() -> impl Strategy<Value = (bool, bool, bool, bool)> {
    (any::<bool>(), any::<bool>(), any::<bool>(), any::<bool>())
}

fn transmit_delay() -> impl Strategy<Value = u32> {
    0u32..16
}

fn ack_latency() -> impl Strategy<Value = u32> {
    0u32..6
}

/// Generate a 32-bit data value
fn data_value() -> impl Strategy<Value = u64> {
    any::<u32>().prop_map(u64::from)
}

fn address() -> impl Strategy<Value = u64> {
    0u64..0x1000
}

/// Generate a burst of zero-delay accesses: (is_write, word address, data)
fn access_burst() -> impl Strategy<Value = Vec<(bool, u64, u64)>> {
    prop::collection::vec((any::<bool>(), 0u64..8, data_value()), 1..10)
}

#[cfg(test)]
mod property_tests {
    use super::*;

    proptest! {
        /// Property: a monitor starts a capture only on an unstalled strobe,
        /// and the responder side also needs an open cycle
        #[test]
        fn prop_acceptance_gating((cyc, stb, stall, ack) in control_lines()) {
            let bus = BusSnapshot {
                edge: 0,
                rst: false,
                req: RequesterSignals { cyc, stb, we: true, ..RequesterSignals::default() },
                rsp: ResponderSignals { ack, stall, ..ResponderSignals::default() },
            };
            let mut near = Monitor::new("q", Vantage::Requester);
            let mut far = Monitor::new("r", Vantage::Responder);

            prop_assert_eq!(!near.on_rising_edge(&bus).is_empty(), stb && !stall);
            prop_assert_eq!(!far.on_rising_edge(&bus).is_empty(), cyc && stb && !stall);
        }

        /// Property: a record is presented exactly `delay` edges after the
        /// driver takes it, and is visible to the following edge
        #[test]
        fn prop_transmit_delay_is_exact(delay in transmit_delay()) {
            let mut helper = Wb4PropertyHelper::new(SlaveTiming::default());
            let mut ticket = SingleWriteSequence::new()
                .address(0x4)
                .transmit_delay(delay)
                .start(&helper.sequencer)
                .unwrap();

            let first_strobe = (0..40u64)
                .map(|_| helper.tb.step())
                .find(|sample| sample.req.stb)
                .map(|sample| sample.edge);
            prop_assert_eq!(first_strobe, Some(u64::from(delay) + 1));
            prop_assert_eq!(
                ticket.try_status(),
                Some(ItemStatus::Completed { edge: u64::from(delay) + 1 })
            );
        }

        /// Property: while reset is sampled, strobe and cycle stay low and
        /// no queued record is consumed
        #[test]
        fn prop_reset_consumes_nothing(reset_edges in 1u64..12, pending in 1usize..4) {
            let mut helper = Wb4PropertyHelper::new(SlaveTiming::default());
            let mut tickets: Vec<_> = (0..pending)
                .map(|i| {
                    SingleWriteSequence::new()
                        .address(i as u64)
                        .start(&helper.sequencer)
                        .unwrap()
                })
                .collect();

            helper.tb.set_reset(true);
            for _ in 0..reset_edges {
                let sample = helper.tb.step();
                prop_assert!(!sample.req.stb && !sample.req.cyc);
            }
            prop_assert!(tickets.iter_mut().all(|t| t.try_status().is_none()));
            prop_assert_eq!(helper.published(), 0);

            helper.tb.set_reset(false);
            let done = helper.tb.run_until(20, |tb| {
                tb.driver().map(Driver::items_done) == Some(pending as u64)
            });
            prop_assert!(done.is_some(), "queued writes never completed");
        }

        /// Property: a read returns the stored word with its address tag,
        /// whatever the responder latency, and both vantages agree on it
        #[test]
        fn prop_read_correlates_with_response(
            latency in ack_latency(),
            addr in address(),
            value in data_value(),
            tag in 0u64..256,
        ) {
            let mut helper = Wb4PropertyHelper::new(SlaveTiming {
                ack_latency: latency,
                stall_after_accept: 0,
            });
            helper.tb.responder_mut().poke(addr, value);
            let mut near = helper.tb.monitor_mut(0).unwrap().subscribe();
            let mut far = helper.tb.monitor_mut(1).unwrap().subscribe();

            SingleReadSequence::new()
                .address(addr)
                .address_tag(tag)
                .start(&helper.sequencer)
                .unwrap();
            let done = helper.tb.run_until(20, |tb| {
                tb.monitors().iter().all(|m| m.num_items() == 1)
            });
            prop_assert!(done.is_some(), "read never completed at latency {}", latency);

            let seen_near = near.try_recv().unwrap();
            let seen_far = far.try_recv().unwrap();
            prop_assert!(seen_near.is_read());
            prop_assert_eq!(seen_near.data_out(), value);
            prop_assert_eq!(seen_near.data_tag(), tag);
            prop_assert!(seen_near.acknowledge());
            prop_assert!(seen_near.same_request(&seen_far));
        }

        /// Property: back-to-back accesses with overlapping responses are
        /// each published once, with their own response
        #[test]
        fn prop_back_to_back_traffic_correlates(
            latency in ack_latency(),
            burst in access_burst(),
        ) {
            let mut helper = Wb4PropertyHelper::new(SlaveTiming {
                ack_latency: latency,
                stall_after_accept: 0,
            });
            let mut near = helper.tb.monitor_mut(0).unwrap().subscribe();
            let mut far = helper.tb.monitor_mut(1).unwrap().subscribe();

            let mut model = std::collections::HashMap::new();
            let mut expected = Vec::new();
            for (i, &(write, addr, value)) in burst.iter().enumerate() {
                let tag = i as u64;
                if write {
                    SingleWriteSequence::new()
                        .address(addr)
                        .data(value)
                        .select(0xF)
                        .address_tag(tag)
                        .start(&helper.sequencer)
                        .unwrap();
                    model.insert(addr, value);
                    expected.push((true, addr, 0));
                } else {
                    SingleReadSequence::new()
                        .address(addr)
                        .address_tag(tag)
                        .start(&helper.sequencer)
                        .unwrap();
                    expected.push((false, addr, *model.get(&addr).unwrap_or(&0)));
                }
            }

            let total = burst.len() as u64;
            let done = helper.tb.run_until(100, |tb| {
                tb.monitors().iter().all(|m| m.num_items() == total)
            });
            prop_assert!(done.is_some(), "burst never drained at latency {}", latency);

            // writes publish on acceptance, reads on their ack
            let mut near_records = Vec::new();
            let mut far_records = Vec::new();
            while let Ok(record) = near.try_recv() {
                near_records.push(record);
            }
            while let Ok(record) = far.try_recv() {
                far_records.push(record);
            }
            prop_assert_eq!(near_records.len(), expected.len());
            prop_assert_eq!(far_records.len(), expected.len());
            near_records.sort_by_key(|r| r.address_tag());
            far_records.sort_by_key(|r| r.address_tag());

            for (i, &(write, addr, data)) in expected.iter().enumerate() {
                let seen_near = near_records[i];
                let seen_far = far_records[i];
                prop_assert_eq!(seen_near.write_enable(), write);
                prop_assert_eq!(seen_near.address(), addr);
                prop_assert_eq!(seen_near.address_tag(), i as u64);
                if !write {
                    prop_assert_eq!(seen_near.data_out(), data);
                    prop_assert_eq!(seen_near.data_tag(), i as u64);
                    prop_assert!(seen_near.acknowledge());
                }
                prop_assert!(seen_near.same_request(&seen_far));
            }
        }

        /// Property: byte lanes outside `sel` keep their old contents
        #[test]
        fn prop_select_masks_write(old in data_value(), new in data_value(), sel in 0u64..16) {
            let mut helper = Wb4PropertyHelper::new(SlaveTiming::default());
            helper.tb.responder_mut().poke(0x8, old);
            SingleWriteSequence::new()
                .address(0x8)
                .data(new)
                .select(sel)
                .start(&helper.sequencer)
                .unwrap();
            helper.tb.run_for(3);

            let lanes = (0..4)
                .filter(|lane| (sel >> lane) & 1 == 1)
                .fold(0u64, |acc, lane| acc | (0xff << (lane * 8)));
            prop_assert_eq!(helper.tb.responder().peek(0x8), (old & !lanes) | (new & lanes));
        }
    }
}
