//! Normalization of upstream events and assembly of output calendars.

mod merge;
pub mod models;
mod normalize;

pub use merge::{CalendarBuilder, MergeMode};
pub use models::{CalendarEntry, CanonicalEvent, DateSpan, OutputCalendar, SubEvent};
pub use normalize::{
    clean_description, clean_location, compose_description, normalize, DEFAULT_EVENT_LENGTH,
};
