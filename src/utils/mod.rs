pub mod ics;
pub mod time;
