//! The signer RPC server: wraps a [`Chain`], its [`Store`], and a local
//! [`BlockSigner`] behind `sign_block`, `get_block`, and `block_height`.

use crate::auth::AuthLayer;
use crate::rpc_api::{BlockHeightResponse, RpcError, SignBlockResponse, SignerApiServer};
use chain_core::chain::Chain;
use chain_core::config::Config;
use chain_core::signer::BlockSigner;
use chain_core::store::Store;
use chain_core::Block;
use jsonrpsee::core::async_trait;
use jsonrpsee::core::RpcResult;
use jsonrpsee::server::{Server, ServerHandle};
use std::net::SocketAddr;
use std::sync::Arc;

pub struct SignerRpcServer {
    chain: Arc<Chain>,
    store: Arc<dyn Store>,
    signer: Arc<BlockSigner>,
    config: Config,
}

impl SignerRpcServer {
    pub fn new(chain: Arc<Chain>, store: Arc<dyn Store>, signer: Arc<BlockSigner>, config: Config) -> Self {
        Self {
            chain,
            store,
            signer,
            config,
        }
    }
}

#[async_trait]
impl SignerApiServer for SignerRpcServer {
    async fn sign_block(&self, block_hex: String) -> RpcResult<SignBlockResponse> {
        let bytes = hex::decode(&block_hex).map_err(RpcError::BadHex)?;
        let block = Block::decode_full(&bytes).map_err(RpcError::BadWire)?;

        let prev_header = self.chain.tip_header();
        let prev_snapshot = self.chain.current_snapshot();
        let signature = self
            .signer
            .validate_and_sign_block(&prev_header, &prev_snapshot, &block, &self.config)
            .map_err(|e| RpcError::Validation(e.to_string()))?;

        tracing::info!(height = block.header.height, "signed block");
        Ok(SignBlockResponse {
            signature: hex::encode(signature),
        })
    }

    async fn get_block(&self, height: u64) -> RpcResult<Option<String>> {
        self.chain
            .wait_for_block_soon(height)
            .await
            .map_err(|_| RpcError::DistantFuture)?;

        let block = self
            .store
            .get_block(height)
            .map_err(|e| RpcError::Store(e.to_string()))?;
        Ok(block.map(|b| hex::encode(b.encode_full())))
    }

    async fn block_height(&self) -> RpcResult<BlockHeightResponse> {
        Ok(BlockHeightResponse {
            block_height: self.chain.height(),
        })
    }
}

/// Starts the signer RPC server on `addr`, rejecting any request whose
/// `x-node-id`/`x-chain-id` headers don't match `node_id`/`chain_id`.
/// Returns a handle the caller keeps alive (or calls `.stop()` on) to
/// control the server's lifetime.
pub async fn serve(
    addr: SocketAddr,
    node_id: &str,
    chain_id: &str,
    rpc_server: SignerRpcServer,
) -> Result<ServerHandle, std::io::Error> {
    let middleware = tower::ServiceBuilder::new().layer(AuthLayer::new(node_id, chain_id));

    let server = Server::builder()
        .set_http_middleware(middleware)
        .build(addr)
        .await?;

    let handle = server.start(rpc_server.into_rpc());
    tracing::info!(%addr, "signer rpc server listening");
    Ok(handle)
}
