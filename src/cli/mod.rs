pub mod app;
pub mod commands;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod env;
pub mod observe;
pub mod output;
pub mod parse;
pub mod replay;
pub mod runtime;
pub mod watch;

pub use app::run;
