pub mod error;
pub mod frontmatter;
pub mod handler;
pub mod runner;

pub use error::MarkdownGenError;
pub use handler::{ContentType, GenerateMarkdownPayload, MarkdownGenHandler};
pub use runner::MarkdownGenRunner;
