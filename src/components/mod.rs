//! Building blocks of the calendar pipeline: upstream gateway, response
//! cache, and the calendar normalizer and merge engine on top of them.

pub mod cache;
pub mod calendar;
pub mod upstream;

pub use cache::ResponseCache;
pub use calendar::{CalendarBuilder, MergeMode, OutputCalendar};
pub use upstream::UpstreamGateway;
