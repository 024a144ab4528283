pub mod segment_query;

pub use segment_query::{join_slots, segment_query, Slot, SlotKind};
