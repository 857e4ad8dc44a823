pub mod defer;
pub mod loader;
pub mod record;
pub mod request;
pub mod scratch;

pub use defer::DeferSize;
pub use loader::{read_file, ReadDataset, ReadOptions};
pub use record::{Field, FieldValue, MetaHeader, SyntheticRecord};
pub use request::ReadRequest;
pub use scratch::ScratchFile;
