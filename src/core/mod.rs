pub mod codec;
pub mod config;
pub mod connectors;
pub mod digest;
pub mod error;
pub mod hierarchy;
pub mod matrix;
pub mod table;
pub mod value;
pub mod witness;
