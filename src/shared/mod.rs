pub mod app_context;

pub use app_context::{AppConfig, AppContext, RuntimeInfo};
