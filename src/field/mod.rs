//! Pixel storage: the per-worker sub-image and the coordinator-side
//! text image format.

pub mod subimage;
pub mod text_io;

pub use subimage::SubImage;
pub use text_io::{read_image, write_image, Image};
