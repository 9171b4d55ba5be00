pub mod core {
    pub mod observer;
    pub mod search;
    pub mod sink;
}

pub mod crypto {
    pub mod crypto;
}

pub mod utils {
    pub mod prefix;
    pub mod verify;
}

pub mod formats {
    pub mod container;
    pub mod jpeg_segment;
    pub mod png_chunk;
}

pub mod config;
pub mod error;

#[cfg(test)]
pub(crate) mod test_support;

pub use crate::config::SearchConfig;
pub use crate::core::search::{HashSpoofer, SearchOutcome, SearchPhase, StopHandle};
pub use crate::error::{Result, SpoofError};
pub use crate::formats::container::{Container, ContainerKind};
