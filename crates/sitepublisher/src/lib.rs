pub mod error;
pub mod handler;

pub use error::SitePublisherError;
pub use handler::{PublishSitePayload, SitePublisherHandler};
