//! Records, bins, values and addressing

pub mod key;
pub mod record;
pub mod value;

pub use key::Key;
pub use record::{Bin, Record, MAX_BINS, MAX_BIN_NAME_LEN};
pub use value::{ParticleType, Value};
