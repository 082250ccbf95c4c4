//! # vsproj manifest
//!
//! Keeps a Visual Studio style project file (`*.njsproj`, `*.csproj`, ...) in step
//! with the files on disk.
//!
//! ## Pipeline
//!
//! ```text
//! Absolute file path
//!     │
//!     ├──> Locator (walk up to a boundary root)
//!     │      └─> ManifestHandle (document shared through ManifestCache)
//!     │
//!     ├──> ManifestEdit (membership check + insert/remove under one lock)
//!     │
//!     └──> Persist (Windows-1252, 2-space indent, cache republish)
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use vsproj_manifest::{ManifestCache, ManifestLocator, WorkspaceRoots};
//!
//! #[tokio::main]
//! async fn main() -> vsproj_manifest::Result<()> {
//!     let cache = Arc::new(ManifestCache::new());
//!     let roots = WorkspaceRoots::from_workspace_folders(["/work/app"])?;
//!     let locator = ManifestLocator::new(cache, "njsproj", roots);
//!
//!     let file = Path::new("/work/app/src/index.js");
//!     let handle = locator.locate_for_file(file).await?;
//!     let mut edit = handle.edit().await;
//!     if !edit.has_entry(file) {
//!         edit.add_entry(file, "Compile");
//!         edit.persist().await?;
//!     }
//!     Ok(())
//! }
//! ```

mod cache;
mod document;
mod error;
mod handle;
mod locator;
mod path;
mod persist;
mod xml;

pub use cache::{InvalidationPause, ManifestCache, SharedDocument};
pub use document::{
    Attribute, GroupEntry, Item, ItemGroup, ManifestDocument, ProjectNode, XmlElement, XmlNode,
    INCLUDE, ITEM_GROUP,
};
pub use error::{ManifestError, Result};
pub use handle::{ManifestEdit, ManifestHandle};
pub use locator::{find_manifest_path, ManifestLocator, WorkspaceRoots};
pub use path::{absolutize, is_folder_like, normalize_lexically, relative_to, MANIFEST_SEPARATOR};
pub use xml::{
    decode_manifest_bytes, encode_windows_1252, parse_manifest, to_xml_bytes, to_xml_string,
    FormatOptions, DECLARED_ENCODING,
};
