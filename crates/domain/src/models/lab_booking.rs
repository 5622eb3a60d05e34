//! Lab booking time-slot picker.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use shared::time::{format_with_offset, local_to_utc};

/// Labs that can be booked.
pub const LAB_LOCATIONS: [&str; 4] = ["Research Lab", "Physics Lab", "Chemistry Lab", "Biology Lab"];

/// Length of one slot.
pub const SLOT_MINUTES: i64 = 20;

/// Number of bookable slots per day (08:00 to 18:20).
pub const SLOT_COUNT: usize = 32;

const FIRST_SLOT_HOUR: u32 = 8;

/// Start time of the slot at `index`.
pub fn slot_start(index: usize) -> Option<NaiveTime> {
    if index >= SLOT_COUNT {
        return None;
    }
    let minutes = index as u32 * SLOT_MINUTES as u32;
    NaiveTime::from_hms_opt(FIRST_SLOT_HOUR + minutes / 60, minutes % 60, 0)
}

/// `HH:MM` labels of every slot.
pub fn slot_labels() -> Vec<String> {
    (0..SLOT_COUNT)
        .filter_map(slot_start)
        .map(|t| t.format("%H:%M").to_string())
        .collect()
}

/// Tap-driven range selection over the slot grid.
///
/// First tap starts a range. Second tap on another slot ends it, on the
/// same slot it leaves the range a single slot. Any further tap starts over.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SlotSelection {
    start: Option<usize>,
    end: Option<usize>,
}

impl SlotSelection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tap(&mut self, index: usize) -> Result<(), DomainError> {
        if index >= SLOT_COUNT {
            return Err(DomainError::validation(format!(
                "Slot {} is outside 0..{}",
                index, SLOT_COUNT
            )));
        }

        match (self.start, self.end) {
            (None, _) => {
                self.start = Some(index);
                self.end = None;
            }
            (Some(start), None) => {
                self.end = if index == start { None } else { Some(index) };
            }
            (Some(_), Some(_)) => {
                self.start = Some(index);
                self.end = None;
            }
        }
        Ok(())
    }

    pub fn is_selected(&self, index: usize) -> bool {
        match self.range() {
            Some((first, last)) => (first..=last).contains(&index),
            None => false,
        }
    }

    /// Inclusive `(first, last)` slot indices, in order.
    pub fn range(&self) -> Option<(usize, usize)> {
        let start = self.start?;
        let end = self.end.unwrap_or(start);
        Some((start.min(end), start.max(end)))
    }
}

/// Request to confirm a lab booking.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LabBookingRequest {
    pub lab: String,
    pub date: NaiveDate,
    /// Slot indices in the order they were tapped.
    pub taps: Vec<usize>,
}

/// A confirmed lab booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct LabBooking {
    pub lab: String,
    pub starts_at: String,
    pub ends_at: String,
    pub first_slot: usize,
    pub last_slot: usize,
}

impl LabBooking {
    /// Resolves a selection on `date` into `[first start, last start + slot)`.
    pub fn resolve(
        lab: &str,
        date: NaiveDate,
        selection: &SlotSelection,
        offset: FixedOffset,
    ) -> Result<Self, DomainError> {
        let lab = LAB_LOCATIONS
            .iter()
            .find(|l| l.eq_ignore_ascii_case(lab.trim()))
            .ok_or_else(|| DomainError::validation(format!("Unknown lab '{}'", lab)))?;

        let (first, last) = selection
            .range()
            .ok_or_else(|| DomainError::validation("Select at least one time slot"))?;

        let start = slot_instant(date, first, offset)?;
        let end = slot_instant(date, last, offset)? + Duration::minutes(SLOT_MINUTES);

        Ok(Self {
            lab: lab.to_string(),
            starts_at: format_with_offset(start, offset),
            ends_at: format_with_offset(end, offset),
            first_slot: first,
            last_slot: last,
        })
    }
}

fn slot_instant(
    date: NaiveDate,
    index: usize,
    offset: FixedOffset,
) -> Result<DateTime<Utc>, DomainError> {
    use chrono::Timelike;

    let time = slot_start(index)
        .ok_or_else(|| DomainError::validation(format!("Unknown slot {}", index)))?;
    local_to_utc(date, time.hour(), time.minute(), offset)
        .ok_or_else(|| DomainError::validation("Slot time cannot be represented"))
}
