//! Reading the physical disc

pub mod backend;
pub mod drive;
#[cfg(feature = "libdiscid")]
pub mod libdiscid;

pub use backend::{Backend, CdInfoReader, IsrcToolReader};
pub use drive::{CdDrive, DiscReadError, DiscReader, RawToc};
#[cfg(feature = "libdiscid")]
pub use libdiscid::LibdiscidReader;
