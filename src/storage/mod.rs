pub mod buffer;
pub mod file;
pub mod kv;
pub mod page;
