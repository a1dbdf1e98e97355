pub mod browser;
pub mod normalize;
pub mod pagination;
pub mod parser;
pub mod traits;

pub use browser::{BrowserSession, RenderedPageFetcher};
pub use pagination::PaginationDriver;
pub use traits::PageFetcher;
