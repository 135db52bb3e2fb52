//! Package-backed module catalogs.
//!
//! A [`PackageCatalog`] downloads one package through a [`PackageClient`]
//! and exposes the modules of its binaries; a [`FeedCatalog`] does the same
//! for every package a feed search returns. Runtime binaries shipped with a
//! package are handed to each loading context as resolution hints.

pub mod client;
pub mod feed;
pub mod local;
pub mod package;

pub use client::{
    DownloadRequest, Manifest, PackageClient, PackageFeed, PackageRef, RuntimeBinary,
    MANIFEST_FILE_NAME,
};
pub use feed::{FeedCatalog, DEFAULT_MAX_PACKAGES};
pub use local::DirectoryFeedClient;
pub use package::{PackageCatalog, PackageCatalogOptions};
