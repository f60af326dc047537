//! Fingerprinting: MinHash signatures (§4.3) and the banded LSH index that
//! retrieves candidates from them (§4.4).

pub mod lsh;
pub mod minhash;

pub use lsh::{LshIndex, SeqId};
pub use minhash::{signature, MinHashSignature};
