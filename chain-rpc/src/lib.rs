//! JSON-RPC transport for the federation's signer coordination: sign-block,
//! get-block, and block-height, carried over `jsonrpsee`.

pub mod auth;
pub mod client;
pub mod rpc_api;
pub mod server;

pub use client::HttpRemoteSigner;
pub use rpc_api::{RpcError, SignerApiClient, SignerApiServer};
pub use server::SignerRpcServer;
