pub mod index;
pub mod service;
pub mod util;

pub use index::{CratesLocalIndex, IndexConfig};
pub use service::CratesIndexService;
