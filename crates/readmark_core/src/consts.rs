// crates/readmark_core/src/consts.rs

pub const BIT_ON: u8 = 1;
pub const BIT_OFF: u8 = 0;

pub const BYTE_BITS: usize = 8;

/// Number of tracked catalog slots. 20000 bits pack into 2500 bytes, about
/// 3.3 KB once base64-encoded, comfortably inside the store quotas
/// (8 KB per item, ~100 KB total).
pub const STATE_CAPACITY: usize = 20_000;

/// Well-known key the encoded state lives under in the sync store.
pub const STORE_KEY: &str = "scp1";

const _: () = { assert!(STATE_CAPACITY % BYTE_BITS == 0) };
