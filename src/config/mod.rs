mod file;
mod resolver;
mod settings;
mod token_store;

pub use file::ConfigFile;
pub use resolver::{ConfigResolver, ResolvedArgs, ValueSource};
pub use settings::{
    endpoint, CloudAuthSettings, CloudSettings, LocalSettings, StructureSettings,
    DEFAULT_SOURCE_DIR,
};
pub use token_store::{StoredToken, TokenStore};
