pub mod publisher;

pub use publisher::{NackEvent, NackPublisher};
