pub mod datastore;
pub mod device;

pub use datastore::{DataStore, Row, MAX_BATCH_SIZE, RESERVED_COLUMNS};
pub use device::Device;
