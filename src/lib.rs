pub mod error;

pub mod storage;

pub mod codec;

pub mod config;
