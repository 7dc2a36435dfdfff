//! # Flagwatch Directory
//! HTTP client for the competition directory (CTFtime-compatible API).

pub mod client;

pub use client::DirectoryClient;
