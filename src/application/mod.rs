// Application layer - use cases and orchestration over the repository.
// Validation of collaborator input lives here; the domain stays pure.

pub mod error;
pub mod report;
pub mod service;

pub use error::*;
pub use report::*;
pub use service::*;
