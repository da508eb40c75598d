//! Scanner variants, one per kind of media source

pub mod filesystem;
pub mod media_store;
pub mod remote;

pub use filesystem::FilesystemScanner;
pub use media_store::MediaStoreScanner;
pub use remote::RemoteCatalogScanner;
