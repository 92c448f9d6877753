pub mod cache;
pub mod resolver;

pub use cache::OaStatusCache;
pub use resolver::OaResolver;
