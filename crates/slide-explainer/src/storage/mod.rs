pub mod blob;

pub use blob::{write_json_atomically, BlobLayout};
