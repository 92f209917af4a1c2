pub mod app;
pub mod commands;
pub mod context;
pub mod dispatch;
pub mod env;
pub mod fingerprint;
pub mod output;
pub mod replay;
pub mod runtime;

pub use app::run;
