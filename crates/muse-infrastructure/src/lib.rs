//! Filesystem and network adapters: paths, config files, samples,
//! reference-image conversion and export downloads.

pub mod config_service;
pub mod download;
pub mod paths;
pub mod reference_image;
pub mod samples;
pub mod storage;

pub use config_service::ConfigService;
pub use download::{BlobRegistry, DownloadService};
pub use paths::{MusePaths, PathError};
pub use reference_image::FileAndUrlResolver;
pub use samples::SamplesRepository;
pub use storage::{SecretStorage, SecretStorageError};
