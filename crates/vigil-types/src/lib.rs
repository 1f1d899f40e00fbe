/// Shared types, traits, and errors for the Vigil treatment review workflow.
///
/// This crate is the foundation that all other Vigil crates depend on.
/// It contains:
/// - **Trait contracts** (`traits`) for the generator, confirmation channel and LLM provider
/// - **Shared data types** (`records`) for patients, recommendations and decisions
/// - **Error types** (`errors`) for unified error handling
/// - **Config types** (`config`, `config_loader`) for configuration file parsing
pub mod config;
pub mod config_loader;
pub mod errors;
pub mod records;
pub mod traits;

// Re-export commonly used types at the crate root for convenience.
pub use config_loader::ConfigLoader;
pub use errors::{InvalidResponse, VigilError};
pub use records::*;
pub use traits::*;
