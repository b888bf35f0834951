#[cfg(feature = "browser")]
pub mod browser_host;
pub mod delivery;
mod http;
pub mod http_host;
pub mod parser;
pub mod targets;

#[cfg(feature = "browser")]
pub use browser_host::BrowserPageHost;
pub use delivery::ReqwestDelivery;
pub use http_host::HttpPageHost;
pub use parser::ProductPageParser;
pub use targets::ReqwestTargetSource;
