pub mod reader;

pub use reader::{watch, AvailabilityReader, SlotView};
