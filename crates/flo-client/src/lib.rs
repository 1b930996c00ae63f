//! flo client
//!
//! Signs requests to the flo workflow API, resolves workflow names to their
//! server-assigned aliases, and invokes workflows with JSON payloads.
//!
//! ```no_run
//! # async fn run() -> flo_client::FloResult<()> {
//! use flo_client::{ClientConfig, Credentials, FloClient};
//!
//! let config = ClientConfig::load()?.with_credentials(Credentials::new("key", "secret"));
//! let client = FloClient::new(config)?;
//!
//! let result = client.invoke("billing", &serde_json::json!({ "amt": 5 })).await?;
//! println!("{}", result);
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod request;
pub mod signer;
pub mod transport;

pub use cache::{AliasCache, WorkflowDirectory, WorkflowSummary};
pub use client::{FloApi, FloClient};
pub use config::{ClientConfig, Credentials, Endpoint};
pub use error::{FloError, FloResult};
pub use request::{HttpMethod, RequestBuilder, Route, SignedRequest, INVOKE_WORKFLOW, LIST_WORKFLOWS};
pub use transport::{HttpTransport, Transport, TransportResponse};
