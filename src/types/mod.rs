mod block;
mod header;
mod receipt;
mod transaction;

pub use block::{derive_list_hash, Block};
pub use header::Header;
pub use receipt::{accrue_log, Log, Receipt};
pub use transaction::{ConsensusSigner, Transaction};
