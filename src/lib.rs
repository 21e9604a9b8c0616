//! Core data model and lifecycle rules for a tiled multidimensional typed array storage engine.
//!
//! `tilestore` defines the objects a storage engine binding must expose and keep
//! internally consistent before anything is persisted:
//!  - [`context::Context`]: execution environment holding configuration and a storage backend,
//!  - [`array::Dimension`] and [`array::Domain`]: the coordinate space of an array,
//!  - [`array::Attribute`]: a named, typed, optionally filtered value stored per cell,
//!  - [`array::ArraySchema`]: a validated, immutable blueprint combining the above,
//!  - [`array::Array`]: a persisted instance opened in a mode and explicitly closed.
//!
//! The on-disk format, filter execution, and query engine are external collaborators
//! reached through [`storage::StorageBackend`]. Two reference backends are provided:
//! [`storage::MemoryBackend`] and [`storage::FilesystemBackend`].
//!
//! ## Example
//! ```rust,ignore
//! use tilestore::array::{
//!     Array, ArrayKind, ArraySchemaBuilder, Attribute, DataType, Dimension,
//!     DimensionConstraints, Domain, Mode, OpenOptions,
//! };
//!
//! let rows = Dimension::new("rows", DataType::Int32, DimensionConstraints::int([1, 4], 4))?;
//! let cols = Dimension::new("cols", DataType::Int32, DimensionConstraints::int([1, 4], 4))?;
//! let domain = Domain::new(vec![rows, cols])?;
//! let schema = ArraySchemaBuilder::new(ArrayKind::Dense, domain)
//!     .attribute(Attribute::new("a", DataType::Int32)?)
//!     .build()?;
//!
//! Array::create("tmp/quickstart_dense", &schema)?;
//! let mut array = Array::open("tmp/quickstart_dense", Mode::Write)?;
//! // array.store(..)
//! array.close()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(unused_variables)]
#![warn(dead_code)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![deny(clippy::missing_panics_doc)]

pub mod array;
pub mod config;
pub mod context;
pub mod storage;
pub mod version;
