pub mod producer;
pub mod types;

pub use producer::{EventProducer, ProducerConfig};
pub use types::{topics, BookingConfirmedEvent, EventEnvelope, EventType};
