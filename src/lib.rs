//! tuscache library
//!
//! A disk cache in front of the Tushare Pro API: typed dataset accessors
//! ([`data::TushareData`]) backed by parquet payloads and JSON freshness
//! metadata ([`cache`]).

pub mod cache;
pub mod cli;
pub mod config;
pub mod data;
