pub mod assemble;
pub mod config;
pub mod error;
pub mod model;
pub mod page;
pub mod paths;
pub mod retrieve;
pub mod store;
pub mod text;

pub use config::ResolvedConfig;
pub use error::{Error, Result};
pub use model::{Retrieved, Source};
pub use page::{AgentPage, ApiResponse, RetrievalContext};
