pub mod business_search;

pub use business_search::{DuckDuckGoSearch, SearchHit, SearchReport, WebSearch, query_for};
