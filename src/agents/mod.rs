pub mod datafetcher_agent;
pub mod underwriter_agent;

pub use datafetcher_agent::{AnalysisMode, DATAFETCHER, DataFetcherAction, DataFetcherAgent};
pub use underwriter_agent::{FinancialFindings, UNDERWRITER, Underwriter, UnderwriterAgent};
