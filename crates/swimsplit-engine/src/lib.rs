pub mod backend;
pub mod capture;
pub mod config;
pub mod error;
pub mod fetch;
pub mod pipeline;
pub mod publish;
pub mod session;
pub mod sheets;

pub use swimsplit_common as common;
