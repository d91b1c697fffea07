use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use time::{Duration, OffsetDateTime};

use crate::errors::ValidationError;
use crate::models::{Field, FieldValue, HistoryPoint, Location, LocationView, Snapshot};
use crate::services::clock::Clock;

#[derive(Debug)]
struct LocationRecord {
    connected: bool,
    last_seen: Option<OffsetDateTime>,
    fields: BTreeMap<Field, FieldValue>,
    history: VecDeque<HistoryPoint>,
}

impl LocationRecord {
    fn new(capacity: usize) -> Self {
        Self {
            connected: false,
            last_seen: None,
            fields: Field::ALL
                .into_iter()
                .map(|field| (field, field.default_value()))
                .collect(),
            history: VecDeque::with_capacity(capacity),
        }
    }

    fn touch(&mut self, now: OffsetDateTime) {
        self.last_seen = Some(now);
        self.connected = true;
    }

    fn number(&self, field: Field) -> f64 {
        self.fields
            .get(&field)
            .and_then(FieldValue::as_number)
            .unwrap_or_default()
    }

    fn push_history(&mut self, point: HistoryPoint, capacity: usize) {
        while self.history.len() >= capacity {
            self.history.pop_front();
        }
        self.history.push_back(point);
    }

    fn view(&self, location: Location) -> LocationView {
        LocationView {
            location,
            fields: self.fields.clone(),
            history: self.history.iter().copied().collect(),
            connected: self.connected,
            last_seen: self.last_seen.map(Into::into),
        }
    }
}

/// In-memory state for every known location.
///
/// Each location sits behind its own lock, and every public operation runs in
/// a single critical section, so readers never see half of an update. Guards
/// are never held across an `.await`.
pub struct StateStore {
    records: BTreeMap<Location, Mutex<LocationRecord>>,
    bus_connected: AtomicBool,
    history_capacity: usize,
    clock: Arc<dyn Clock>,
}

impl StateStore {
    /// Panics if `history_capacity` is zero; settings validation rules that out.
    pub fn new(history_capacity: usize, clock: Arc<dyn Clock>) -> Self {
        assert!(history_capacity > 0, "history capacity must be at least 1");

        let records = Location::ALL
            .into_iter()
            .map(|location| (location, Mutex::new(LocationRecord::new(history_capacity))))
            .collect();

        Self {
            records,
            bus_connected: AtomicBool::new(false),
            history_capacity,
            clock,
        }
    }

    fn record(&self, location: Location) -> MutexGuard<'_, LocationRecord> {
        // Poisoning is ignored: every mutation below is a plain assignment.
        self.records[&location]
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    pub fn snapshot(&self, location: Location) -> LocationView {
        self.record(location).view(location)
    }

    pub fn snapshot_all(&self) -> Snapshot {
        let locations = Location::ALL
            .into_iter()
            .map(|location| (location, self.snapshot(location)))
            .collect();

        Snapshot {
            locations,
            bus_connected: self.bus_connected(),
        }
    }

    /// Applies a raw payload received from a device.
    ///
    /// The location counts as seen whether or not the payload validates. On a
    /// validation failure the field keeps its previous value. An accepted
    /// climate reading also appends a history point.
    pub fn update_field(
        &self,
        location: Location,
        field: Field,
        raw: &str,
    ) -> Result<(), ValidationError> {
        let parsed = field.parse(raw);
        let now = self.clock.now();

        let mut record = self.record(location);
        record.touch(now);

        let value = parsed?;
        self.store_value(&mut record, field, value, now);

        Ok(())
    }

    /// Records a value this service sent out itself. Liveness is left alone:
    /// only traffic from the device says anything about the device.
    pub fn apply_echo(
        &self,
        location: Location,
        field: Field,
        raw: &str,
    ) -> Result<(), ValidationError> {
        let value = field.parse(raw)?;
        let now = self.clock.now();

        let mut record = self.record(location);
        self.store_value(&mut record, field, value, now);

        Ok(())
    }

    fn store_value(
        &self,
        record: &mut LocationRecord,
        field: Field,
        value: FieldValue,
        now: OffsetDateTime,
    ) {
        record.fields.insert(field, value);

        if matches!(field, Field::Temperature | Field::Humidity) {
            let point = HistoryPoint {
                timestamp: now.into(),
                temperature: record.number(Field::Temperature),
                humidity: record.number(Field::Humidity),
            };
            record.push_history(point, self.history_capacity);
        }
    }

    pub fn append_history(
        &self,
        location: Location,
        temperature: f64,
        humidity: f64,
        timestamp: OffsetDateTime,
    ) {
        let point = HistoryPoint {
            timestamp: timestamp.into(),
            temperature,
            humidity,
        };

        self.record(location)
            .push_history(point, self.history_capacity);
    }

    /// Sets connectivity explicitly, returning the previous value.
    pub fn set_connectivity(&self, location: Location, connected: bool) -> bool {
        let mut record = self.record(location);
        std::mem::replace(&mut record.connected, connected)
    }

    pub fn mark_device_event(&self, location: Location) {
        let now = self.clock.now();
        self.record(location).touch(now);
    }

    /// Demotes every connected location silent for longer than `timeout` and
    /// returns the ones that changed.
    pub fn expire_stale(&self, timeout: Duration) -> Vec<Location> {
        let now = self.clock.now();

        Location::ALL
            .into_iter()
            .filter(|location| {
                let mut record = self.record(*location);
                let silent_for = record.last_seen.map(|seen| now - seen);

                let expired = record.connected
                    && silent_for.is_none_or(|silent_for| silent_for > timeout);

                if expired {
                    record.connected = false;
                }

                expired
            })
            .collect()
    }

    pub fn set_bus_connected(&self, connected: bool) -> bool {
        self.bus_connected.swap(connected, Ordering::SeqCst)
    }

    pub fn bus_connected(&self) -> bool {
        self.bus_connected.load(Ordering::SeqCst)
    }
}
