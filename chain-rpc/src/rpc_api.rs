//! The JSON-RPC method surface and wire types. Block bytes travel
//! hex-encoded since JSON has no native byte-string type; the underlying
//! payload is still `chain-core`'s bit-exact canonical encoding.

use jsonrpsee::core::RpcResult;
use jsonrpsee::proc_macros::rpc;
use jsonrpsee::types::ErrorObjectOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SignBlockResponse {
    pub signature: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BlockHeightResponse {
    pub block_height: u64,
}

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("malformed block hex: {0}")]
    BadHex(#[from] hex::FromHexError),
    #[error("malformed block bytes: {0}")]
    BadWire(#[from] chain_core::wire::WireError),
    #[error("block validation failed: {0}")]
    Validation(String),
    #[error("store error: {0}")]
    Store(String),
    #[error("request timed out before the requested height was reached")]
    DistantFuture,
}

impl From<RpcError> for ErrorObjectOwned {
    fn from(err: RpcError) -> Self {
        let code = match &err {
            RpcError::BadHex(_) | RpcError::BadWire(_) => -32602, // invalid params
            RpcError::Validation(_) => -32001,
            RpcError::Store(_) => -32002,
            RpcError::DistantFuture => -32003,
        };
        ErrorObjectOwned::owned(code, err.to_string(), None::<()>)
    }
}

#[rpc(server, client)]
pub trait SignerApi {
    /// `POST /rpc/signer/sign-block`: validates the hex-encoded block
    /// against this node's chain state and, absent equivocation, signs it.
    #[method(name = "signer_signBlock")]
    async fn sign_block(&self, block_hex: String) -> RpcResult<SignBlockResponse>;

    /// `POST /rpc/get-block?height=N`: blocks until `height` is committed
    /// or the server-side deadline elapses, then returns the hex-encoded
    /// block.
    #[method(name = "getBlock")]
    async fn get_block(&self, height: u64) -> RpcResult<Option<String>>;

    /// `POST /rpc/block-height`.
    #[method(name = "blockHeight")]
    async fn block_height(&self) -> RpcResult<BlockHeightResponse>;
}
