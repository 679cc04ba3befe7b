//! Node-to-node calls against a peer's private HTTP surface

use crate::blockchain::BlockData;
use crate::error::ChainError;
use crate::peer::{Peer, PeerStatus};
use crate::transaction::BlockTx;
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Everything the worker asks of another node.
#[async_trait]
pub trait PeerClient: Send + Sync {
    async fn status(&self, peer: &Peer) -> Result<PeerStatus, ChainError>;

    /// Blocks from `from` up to the peer's latest.
    async fn blocks_from(&self, peer: &Peer, from: u64) -> Result<Vec<BlockData>, ChainError>;

    async fn propose_block(&self, peer: &Peer, block: &BlockData) -> Result<(), ChainError>;

    async fn submit_tx(&self, peer: &Peer, tx: &BlockTx) -> Result<(), ChainError>;

    /// Tells `peer` that `me` exists.
    async fn announce(&self, peer: &Peer, me: &Peer) -> Result<(), ChainError>;
}

pub struct HttpPeerClient {
    client: Client,
}

impl HttpPeerClient {
    pub fn new() -> Result<Self, ChainError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;
        Ok(Self { client })
    }

    fn url(peer: &Peer, path: &str) -> String {
        format!("http://{}/v1/node{}", peer.host, path)
    }

    async fn get<R: DeserializeOwned>(&self, peer: &Peer, path: &str) -> Result<R, ChainError> {
        let response = self.client.get(Self::url(peer, path)).send().await?;
        let response = check(peer, response).await?;
        response
            .json()
            .await
            .map_err(|e| ChainError::NetworkError(format!("{}: malformed response: {}", peer, e)))
    }

    async fn post<B: Serialize + Sync>(
        &self,
        peer: &Peer,
        path: &str,
        body: &B,
    ) -> Result<(), ChainError> {
        let response = self.client.post(Self::url(peer, path)).json(body).send().await?;
        check(peer, response).await?;
        Ok(())
    }
}

async fn check(peer: &Peer, response: Response) -> Result<Response, ChainError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(ChainError::NetworkError(format!(
        "{} responded {}: {}",
        peer, status, body
    )))
}

#[async_trait]
impl PeerClient for HttpPeerClient {
    async fn status(&self, peer: &Peer) -> Result<PeerStatus, ChainError> {
        self.get(peer, "/status").await
    }

    async fn blocks_from(&self, peer: &Peer, from: u64) -> Result<Vec<BlockData>, ChainError> {
        self.get(peer, &format!("/block/list/{}/latest", from)).await
    }

    async fn propose_block(&self, peer: &Peer, block: &BlockData) -> Result<(), ChainError> {
        self.post(peer, "/block/propose", block).await
    }

    async fn submit_tx(&self, peer: &Peer, tx: &BlockTx) -> Result<(), ChainError> {
        self.post(peer, "/tx/submit", tx).await
    }

    async fn announce(&self, peer: &Peer, me: &Peer) -> Result<(), ChainError> {
        self.post(peer, "/peers", me).await
    }
}
