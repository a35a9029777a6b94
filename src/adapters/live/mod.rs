//! Live adapters backed by real network, disk, and randomness.

pub mod filesystem;
pub mod http;
pub mod id_gen;

pub use filesystem::LiveFileSystem;
pub use http::ReqwestTransport;
pub use id_gen::UuidIdGenerator;
