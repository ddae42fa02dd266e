pub mod bitset;
pub mod consts;
pub mod errors;
pub mod ident;
pub mod state;

pub use bitset::BitSet;
pub use consts::{STATE_CAPACITY, STORE_KEY};
pub use errors::{ReadmarkError, Result};
pub use ident::{extract_index, is_forum_context};
pub use state::ReadStateStore;
