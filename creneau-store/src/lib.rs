pub mod app_config;
pub mod events;
pub mod memory;
pub mod pg;

pub use events::EventBus;
pub use memory::MemoryStore;
pub use pg::PgStore;
