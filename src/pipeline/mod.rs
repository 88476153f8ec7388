pub mod batch;
pub mod cache;

pub use batch::{BatchAnalyzer, HashtagReport, normalize_hashtag};
pub use cache::{CachedSearch, Clock, ExpiringCache, ManualClock, SystemClock};
