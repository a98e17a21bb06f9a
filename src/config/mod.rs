//! Configuration module

mod site;

pub use site::ProviderConfig;
pub use site::SiteConfig;
