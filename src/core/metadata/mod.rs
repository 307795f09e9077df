//! core::metadata
//!
//! Project metadata: the persisted configuration blob a generator writes at
//! the project root.
//!
//! # Modules
//!
//! - [`schema`] - The metadata document and its namespaced entry
//! - [`store`] - Reading and writing the metadata file in a working tree
//!
//! # Layout
//!
//! The file (default `.yo-rc.json`) is a JSON object keyed by generator
//! package name. Only the entry for the configured generator is interpreted;
//! other namespaces are carried through untouched on rewrite.
//!
//! ```json
//! {
//!   "generator-jhipster": {
//!     "baseName": "upgradeTest",
//!     "generatorVersion": "8.1.0",
//!     "skipClient": true,
//!     "skipServer": true
//!   }
//! }
//! ```
//!
//! # Example
//!
//! ```
//! use scaffold_upgrade::core::metadata::{parse_document, ProjectMetadata};
//!
//! let json = r#"{ "generator-jhipster": { "baseName": "shop", "generatorVersion": "8.1.0" } }"#;
//! let meta = parse_document(json, "generator-jhipster").unwrap().unwrap();
//! assert_eq!(meta.base_name, "shop");
//! assert_eq!(meta.version().unwrap().unwrap().to_string(), "8.1.0");
//! ```

pub mod schema;
pub mod store;

pub use schema::{
    parse_document, render_document, MetadataError, ProjectMetadata, VERSION_PLACEHOLDER,
};
pub use store::MetadataStore;
