//! Client-facing transaction gateway for ledgergate.
//!
//! The [`Gateway`] exposes four operations:
//! - **Evaluate**: run a proposal on one peer and return its result
//! - **Endorse**: collect the endorsements a chaincode's policy requires and
//!   assemble the unsigned transaction
//! - **Submit**: broadcast the client-signed transaction to the ordering
//!   service
//! - **CommitStatus**: wait for the transaction's validation code
//!
//! [`router`] serves the same operations as JSON over HTTP.
//!
//! # Example
//!
//! ```rust,no_run
//! use ledgergate_server::{Gateway, GatewayOptions, GatewayParts, router};
//! use std::sync::Arc;
//!
//! # async fn serve(parts: GatewayParts) -> std::io::Result<()> {
//! let gateway = Arc::new(Gateway::new(parts, GatewayOptions::default()));
//!
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:7080").await?;
//! axum::serve(listener, router(gateway)).await
//! # }
//! ```

pub mod error;
pub mod gateway;
pub mod http;
pub mod options;

// Re-export commonly used types
pub use error::{Code, ErrorResponse, GatewayError};
pub use gateway::{
    CommitStatusRequest, CommitStatusResponse, EndorseRequest, EndorseResponse, EvaluateRequest,
    EvaluateResponse, Gateway, GatewayParts, SubmitRequest, SubmitResponse,
};
pub use http::router;
pub use options::GatewayOptions;
