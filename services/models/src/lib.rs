//! Models Service
//!
//! Small HTTP backend for uploading 3D model files and looking up canned
//! animation presets. Uploaded bytes go to a storage directory on disk;
//! model metadata lives only in memory and is lost on restart.
//!
//! ## Features
//!
//! - **Model Uploads**: `.glb`, `.gltf`, `.obj` and `.fbx` files accepted by
//!   extension (contents are never inspected), streamed to disk
//! - **Model Registry**: list, fetch, download and delete uploaded models
//! - **Animation Presets**: static table of named animation parameters,
//!   plus a grouped listing for clients
//!
//! ## Architecture
//!
//! ```text
//! HTTP client
//!     │
//!     ▼
//! ┌──────────────┐   upload    ┌──────────────┐   bytes   ┌──────────────┐
//! │ API          │────────────▶│ Upload       │──────────▶│ Model        │
//! │ (axum)       │             │ Pipeline     │           │ Storage      │
//! └──────────────┘             └──────────────┘           └──────────────┘
//!     │      │                        │ record                   ▲
//!     │      │ list/get/delete/       ▼                          │
//!     │      │ download        ┌──────────────┐                  │
//!     │      └────────────────▶│ Model        │──────────────────┘
//!     │                        │ Registry     │
//!     │ animate                └──────────────┘
//!     ▼
//! ┌──────────────┐
//! │ Preset Table │
//! │ + Catalog    │
//! └──────────────┘
//! ```

pub mod animate;
pub mod api;
pub mod catalog;
pub mod config;
pub mod error;
pub mod model_registry;
pub mod model_storage;
pub mod presets;
pub mod size;
pub mod upload;

pub use animate::{AnimateRequest, AnimationResult};
pub use api::{create_router, AppState};
pub use catalog::AnimationCatalog;
pub use config::Config;
pub use error::ModelError;
pub use model_registry::{ModelRecord, ModelRegistry, ModelStatus};
pub use model_storage::ModelStorage;
pub use presets::{presets, AnimationPreset, PresetTable};
pub use size::format_file_size;
