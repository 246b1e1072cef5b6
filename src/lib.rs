pub mod bgzf;
pub mod config;
pub mod error;
pub mod handlers;
pub mod pager;
pub mod records;
pub mod storage;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
pub use pager::{Pager, PagerOptions, PagerState};
pub use types::{FileStats, Page};
