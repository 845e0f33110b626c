//! Ordered record of everything the simulated chassis was asked to do.
//!
//! Tests use the journal to assert exact relay sequencing and analog task
//! lifecycles, including settle delays that never actually slept.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rc_core::device::AcquisitionMode;
use rc_core::relay::ChannelAddress;

/// One observable device interaction.
#[derive(Debug, Clone, PartialEq)]
pub enum JournalEvent {
    /// Successful digital line write
    Write {
        /// Line written
        channel: ChannelAddress,
        /// Value written
        state: bool,
    },
    /// Successful digital line readback
    Read {
        /// Line read
        channel: ChannelAddress,
        /// Value read back
        state: bool,
    },
    /// Analog task opened
    AnalogOpen {
        /// Finite or continuous timing
        mode: AcquisitionMode,
        /// Sample clock rate in Hz
        sample_rate: f64,
        /// Samples or buffer size per channel
        samples_per_channel: usize,
    },
    /// Sample clock started
    AnalogStart,
    /// Analog read returning `samples` per channel
    AnalogRead {
        /// Samples per channel returned
        samples: usize,
    },
    /// Analog task stopped
    AnalogStop,
    /// Analog task closed
    AnalogClose,
    /// Settle delay requested through the device's delay handle
    Settle(Duration),
}

/// Shared, cloneable event log.
#[derive(Debug, Clone, Default)]
pub struct Journal {
    events: Arc<Mutex<Vec<JournalEvent>>>,
}

impl Journal {
    /// Empty journal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one event.
    pub fn record(&self, event: JournalEvent) {
        self.events.lock().push(event);
    }

    /// Snapshot of all events in order.
    pub fn events(&self) -> Vec<JournalEvent> {
        self.events.lock().clone()
    }

    /// Drop every recorded event.
    pub fn clear(&self) {
        self.events.lock().clear();
    }

    /// Number of recorded events.
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// True when nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    /// Digital writes in order.
    pub fn writes(&self) -> Vec<(ChannelAddress, bool)> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                JournalEvent::Write { channel, state } => Some((channel.clone(), *state)),
                _ => None,
            })
            .collect()
    }

    /// Settle delays in order.
    pub fn settles(&self) -> Vec<Duration> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                JournalEvent::Settle(d) => Some(*d),
                _ => None,
            })
            .collect()
    }

    /// Analog task lifecycle events only.
    pub fn analog_events(&self) -> Vec<JournalEvent> {
        self.events
            .lock()
            .iter()
            .filter(|e| {
                !matches!(
                    e,
                    JournalEvent::Write { .. } | JournalEvent::Read { .. } | JournalEvent::Settle(_)
                )
            })
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_journal_filters() {
        let journal = Journal::new();
        let line = ChannelAddress::new("cDAQ1Mod2/port0/line0");
        journal.record(JournalEvent::Write {
            channel: line.clone(),
            state: true,
        });
        journal.record(JournalEvent::Settle(Duration::from_millis(500)));
        journal.record(JournalEvent::AnalogStart);
        journal.record(JournalEvent::Write {
            channel: line.clone(),
            state: false,
        });

        assert_eq!(journal.len(), 4);
        assert_eq!(journal.writes(), vec![(line.clone(), true), (line, false)]);
        assert_eq!(journal.settles(), vec![Duration::from_millis(500)]);
        assert_eq!(journal.analog_events(), vec![JournalEvent::AnalogStart]);

        let shared = journal.clone();
        shared.clear();
        assert!(journal.is_empty());
    }
}
