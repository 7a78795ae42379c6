//! Background-context bookkeeping: which inspection session serves which page, and the loop
//! that routes relayed capture events to it.

pub mod api;
pub mod config;
pub mod errors;
pub mod metrics;
pub mod model;
pub mod router;
pub mod state;

pub use api::{NoopInjector, ScriptInjector};
pub use config::RegistryConfig;
pub use errors::RouteError;
pub use model::Connection;
pub use router::{BackgroundRouter, RouterHandle};
pub use state::SessionRegistry;
