//! Bincodec is binary encoding for rust values. For details, see:
//! https://github.com/bincode-org/bincode
//!
//! The bincode::(de)serialize free functions use fixed-length integers. The
//! wrappers here switch to big-endian variable-length integers, which keeps
//! block keys short: a block key is the varint length of the file name, the
//! file name bytes, then the varint block number. Every key of one file
//! therefore starts with the encoding of the file name alone, which is what
//! the file manager scans by.
use bincode::{DefaultOptions, Options};
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub fn serialize<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    let res = DefaultOptions::new().with_big_endian().with_varint_encoding().serialize(value)?;
    Ok(res)
}

pub fn deserialize<'a, T: Deserialize<'a>>(input: &'a [u8]) -> Result<T> {
    let res = DefaultOptions::new().with_big_endian().with_varint_encoding().deserialize(input)?;
    Ok(res)
}
