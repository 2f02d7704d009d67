//! An RPC-backed [`RemoteSigner`]: the generator's view of one federation
//! peer reachable over HTTP, implementing the same trait a local in-process
//! fake would.

use crate::auth::{CHAIN_ID_HEADER, NODE_ID_HEADER};
use crate::rpc_api::SignerApiClient;
use chain_core::error::{GeneratorError, GeneratorResult};
use chain_core::generator::RemoteSigner;
use chain_core::Block;
use http::{HeaderMap, HeaderValue};
use jsonrpsee::core::async_trait;
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};

pub struct HttpRemoteSigner {
    client: HttpClient,
    public_key: [u8; 32],
}

impl HttpRemoteSigner {
    pub fn new(
        url: &str,
        node_id: &str,
        chain_id: &str,
        public_key: [u8; 32],
    ) -> Result<Self, jsonrpsee::core::client::Error> {
        let mut headers = HeaderMap::new();
        headers.insert(NODE_ID_HEADER, HeaderValue::from_str(node_id).expect("valid node id"));
        headers.insert(CHAIN_ID_HEADER, HeaderValue::from_str(chain_id).expect("valid chain id"));

        let client = HttpClientBuilder::default().set_headers(headers).build(url)?;
        Ok(Self { client, public_key })
    }
}

#[async_trait]
impl RemoteSigner for HttpRemoteSigner {
    fn public_key(&self) -> [u8; 32] {
        self.public_key
    }

    async fn sign_block(&self, block: &Block) -> GeneratorResult<Vec<u8>> {
        let block_hex = hex::encode(block.encode_full());
        let response = self
            .client
            .sign_block(block_hex)
            .await
            .map_err(|e| GeneratorError::RemoteSignerFailed(e.to_string()))?;
        hex::decode(&response.signature).map_err(|e| GeneratorError::RemoteSignerFailed(e.to_string()))
    }
}
