//! evalsync-client - Live synchronization engine
//!
//! Maintains a bidirectional session between a client and a remote
//! configuration-evaluation service: as inputs change, the engine
//! keeps the service's evaluated view current and surfaces the
//! evaluated schema back, while the underlying connection may drop,
//! reconnect, and deliver responses out of order.
//!
//! # Example
//!
//! ```rust,no_run
//! use evalsync_client::{Context, Session, SessionConfig, SessionEvent};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let context = Context::new("conditional");
//!     let (session, mut events) =
//!         Session::open(&context, "localhost:8100", SessionConfig::default())?;
//!
//!     session.set_input("region", "eu");
//!
//!     while let Some(event) = events.recv().await {
//!         match event {
//!             SessionEvent::Evaluation(response) => {
//!                 for field in evalsync_core::project(&response) {
//!                     println!("{} = {}", field.label, field.value);
//!                 }
//!             }
//!             SessionEvent::Status(status) => println!("[{status}]"),
//!         }
//!     }
//!
//!     session.dispose().await;
//!     Ok(())
//! }
//! ```
//!
//! # Testing
//!
//! The [`testing`] module provides an in-process scripted evaluation
//! server for integration tests:
//!
//! ```rust,ignore
//! use evalsync_client::testing::ScriptedServer;
//!
//! let mut server = ScriptedServer::start().await?;
//! let (session, events) = Session::open(&context, &server.host(), config)?;
//! ```

mod catalog;
mod connection;
mod context;
mod error;
mod session;
pub mod testing;

pub use catalog::{CatalogClient, ScenarioUser};
pub use connection::{ConnectionManager, ConnectionStatus};
pub use context::Context;
pub use error::{Result, SyncError};
pub use session::{Session, SessionConfig, SessionEvent};

// Re-export core types for convenience
pub use evalsync_core::{project, Correlator, Request, Response};
