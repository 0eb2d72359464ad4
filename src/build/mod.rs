mod archive;

pub use archive::{find_files_with_extension, zip_directory};
