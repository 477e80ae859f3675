/*!
# Fragkit Core

Project model and synchronization engine for page fragment projects.

A project is a directory with a `package.json` manifest and a `src/` tree of
collections, fragments, compositions and page templates. This crate provides:

- A lossless reader and a merge-on-write writer for that layout
- Zip packaging with an optional deployment descriptor
- A remote API port with an HTTP adapter
- Export and import engines that try a bulk transfer first and fall back to
  per-entity calls
- A bundling step for React fragments, watch-mode coalescing and scaffolding

## Architecture

Engines depend on the [`FragmentsApi`] trait only. Authentication travels in an
immutable [`Session`] passed to every call.

## Usage

```rust,no_run
use std::sync::Arc;
use fragkit_core::{read_project, HttpApiClient, ImportEngine, ServerConfig};

# async fn run() -> fragkit_core::Result<()> {
let config = ServerConfig::from_file(".fragkit.json")?.merge_env();
let engine = ImportEngine::new(Arc::new(HttpApiClient::new()?), config.to_session()?);

let project = read_project(".").await?;
if let Some(report) = engine.import_project(&project, config.require_group_id()?).await? {
    for result in report.fragments {
        println!("{}: {}", result.name, result.status);
    }
}
# Ok(())
# }
```
*/

pub mod api;
pub mod build;
pub mod config;
pub mod error;
pub mod observability;
pub mod packager;
pub mod project;
pub mod scaffold;
pub mod sync;
pub mod watch;


pub use api::{FragmentsApi, HttpApiClient, ImportResult, ImportStatus, Session};
pub use build::{build_project, BuildConfig};
pub use config::ServerConfig;
pub use error::{FragkitError, Result};
pub use packager::{compress, write_archive, CompressOptions};
pub use project::{read_project, read_project_from_archive, write_project, Project};
pub use sync::{ExportEngine, ExportSummary, ImportEngine, ImportReport};
