pub mod scorer;

pub use scorer::{recommend, Badge, DemandSignals, Recommendation};
