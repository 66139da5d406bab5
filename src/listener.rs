//! The record event interface and its built-in sinks.
//!
//! The generator reports decoded structure through the six [`MarcListener`]
//! callbacks. Collaborators (XML bridges, dialect adapters) implement the
//! trait and receive events; they must not depend on directory or offset
//! state, which stays inside the generator.
//!
//! Two sinks ship with the crate: [`RecordCollector`] materializes
//! [`Record`] values, and [`EventCollector`] captures the raw callback
//! sequence as tagged [`MarcEvent`] values for driver loops and tests.

use crate::error::Result;
use crate::leader::Leader;
use crate::record::{Field, Record, RecordFormat, RecordKind};

/// Receiver for the generator's record event stream.
///
/// Events arrive in a fixed shape per stream:
/// `begin_collection`, then per record `begin_record`, `leader`, zero or
/// more `field`s, `end_record`, and finally `end_collection`.
///
/// Fields are passed by value; ownership moves to the sink.
pub trait MarcListener {
    /// The stream is starting.
    ///
    /// # Errors
    ///
    /// Implementations may propagate sink failures.
    fn begin_collection(&mut self) -> Result<()> {
        Ok(())
    }

    /// A record is starting.
    ///
    /// # Errors
    ///
    /// Implementations may propagate sink failures.
    fn begin_record(&mut self, format: RecordFormat, kind: RecordKind) -> Result<()>;

    /// The record's leader has been decoded.
    ///
    /// # Errors
    ///
    /// Implementations may propagate sink failures.
    fn leader(&mut self, leader: &Leader) -> Result<()>;

    /// A complete field has been decoded.
    ///
    /// # Errors
    ///
    /// Implementations may propagate sink failures.
    fn field(&mut self, field: Field) -> Result<()>;

    /// The current record is complete.
    ///
    /// # Errors
    ///
    /// Implementations may propagate sink failures.
    fn end_record(&mut self) -> Result<()>;

    /// The stream is complete.
    ///
    /// # Errors
    ///
    /// Implementations may propagate sink failures.
    fn end_collection(&mut self) -> Result<()> {
        Ok(())
    }
}

/// One generator callback, reified as a value.
#[derive(Debug, Clone, PartialEq)]
pub enum MarcEvent {
    /// `begin_collection`.
    BeginCollection,
    /// `begin_record` with its format and kind.
    BeginRecord(RecordFormat, RecordKind),
    /// `leader` with the decoded leader.
    Leader(Leader),
    /// `field` with the decoded field.
    Field(Field),
    /// `end_record`.
    EndRecord,
    /// `end_collection`.
    EndCollection,
}

/// Sink that captures the callback sequence as [`MarcEvent`] values.
#[derive(Debug, Default)]
pub struct EventCollector {
    events: Vec<MarcEvent>,
}

impl EventCollector {
    /// Create an empty collector.
    #[must_use]
    pub fn new() -> Self {
        EventCollector { events: Vec::new() }
    }

    /// The captured events, in arrival order.
    #[must_use]
    pub fn events(&self) -> &[MarcEvent] {
        &self.events
    }

    /// Consume the collector, returning the captured events.
    #[must_use]
    pub fn into_events(self) -> Vec<MarcEvent> {
        self.events
    }
}

impl MarcListener for EventCollector {
    fn begin_collection(&mut self) -> Result<()> {
        self.events.push(MarcEvent::BeginCollection);
        Ok(())
    }

    fn begin_record(&mut self, format: RecordFormat, kind: RecordKind) -> Result<()> {
        self.events.push(MarcEvent::BeginRecord(format, kind));
        Ok(())
    }

    fn leader(&mut self, leader: &Leader) -> Result<()> {
        self.events.push(MarcEvent::Leader(*leader));
        Ok(())
    }

    fn field(&mut self, field: Field) -> Result<()> {
        self.events.push(MarcEvent::Field(field));
        Ok(())
    }

    fn end_record(&mut self) -> Result<()> {
        self.events.push(MarcEvent::EndRecord);
        Ok(())
    }

    fn end_collection(&mut self) -> Result<()> {
        self.events.push(MarcEvent::EndCollection);
        Ok(())
    }
}

/// Sink that materializes complete [`Record`] values.
///
/// The record under construction is replaced, never mutated, across record
/// boundaries.
#[derive(Debug, Default)]
pub struct RecordCollector {
    current: Option<Record>,
    records: Vec<Record>,
}

impl RecordCollector {
    /// Create an empty collector.
    #[must_use]
    pub fn new() -> Self {
        RecordCollector {
            current: None,
            records: Vec::new(),
        }
    }

    /// Records completed so far.
    #[must_use]
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Consume the collector, returning the completed records.
    #[must_use]
    pub fn into_records(self) -> Vec<Record> {
        self.records
    }

    /// Remove and return the oldest completed record.
    pub fn pop_front(&mut self) -> Option<Record> {
        if self.records.is_empty() {
            None
        } else {
            Some(self.records.remove(0))
        }
    }
}

impl MarcListener for RecordCollector {
    fn begin_record(&mut self, format: RecordFormat, kind: RecordKind) -> Result<()> {
        self.current = Some(Record::with_format(format, kind, Leader::default()));
        Ok(())
    }

    fn leader(&mut self, leader: &Leader) -> Result<()> {
        if let Some(record) = self.current.as_mut() {
            record.leader = *leader;
        }
        Ok(())
    }

    fn field(&mut self, field: Field) -> Result<()> {
        if let Some(record) = self.current.as_mut() {
            record.add_field(field);
        }
        Ok(())
    }

    fn end_record(&mut self) -> Result<()> {
        if let Some(record) = self.current.take() {
            self.records.push(record);
        }
        Ok(())
    }
}
