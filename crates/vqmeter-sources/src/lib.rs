//! Frame providers for the comparison pipeline.
//!
//! Each backend implements [`vqmeter_types::Source`]: a cursor-owning reader
//! that fills caller-supplied frame buffers in strict index order.

pub mod backends;
pub mod config;

pub use backends::synthetic::SyntheticSource;
pub use backends::y4m::Y4mSource;
pub use config::{Backend, Configuration};
