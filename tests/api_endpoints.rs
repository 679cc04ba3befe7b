#![cfg(feature = "api")]
//! Integration tests for the public and private HTTP routers
//!
//! These tests drive a node through its HTTP surfaces only and check the JSON
//! each endpoint answers with.

use axum_test::TestServer;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use bundchain::api::{private_router, public_router};
use bundchain::blockchain::{BlockData, CancelToken};
use bundchain::crypto::KeyPair;
use bundchain::events::null_sink;
use bundchain::genesis::Genesis;
use bundchain::peer::{Peer, PeerSet, PeerStatus};
use bundchain::persistence::InMemoryPersistence;
use bundchain::state::{State, StateConfig};
use bundchain::transaction::{BlockTx, UserTx};

struct Fixture {
    state: Arc<State>,
    public: TestServer,
    private: TestServer,
    alice: KeyPair,
    bob: KeyPair,
}

fn genesis(alice: &KeyPair) -> Genesis {
    let mut balances = BTreeMap::new();
    balances.insert(alice.account_id().to_string(), 1_000_000);
    Genesis {
        date: "2024-01-01T00:00:00Z".to_string(),
        chain_id: 1,
        trans_per_block: 10,
        difficulty: 6,
        mining_reward: 700,
        gas_price: 15,
        balances,
    }
}

fn node(genesis: Genesis, host: &str) -> Arc<State> {
    Arc::new(
        State::new(StateConfig {
            beneficiary_id: KeyPair::generate().account_id(),
            host: host.to_string(),
            storage: Arc::new(InMemoryPersistence::new()),
            genesis,
            select_strategy: "tip".to_string(),
            known_peers: PeerSet::new(),
            events: null_sink(),
        })
        .expect("Failed to create state"),
    )
}

fn fixture() -> Fixture {
    let alice = KeyPair::generate();
    let state = node(genesis(&alice), "127.0.0.1:9080");

    Fixture {
        public: TestServer::new(public_router(state.clone()))
            .expect("Failed to create test server"),
        private: TestServer::new(private_router(state.clone()))
            .expect("Failed to create test server"),
        state,
        alice,
        bob: KeyPair::generate(),
    }
}

#[tokio::test]
async fn test_genesis_and_accounts() {
    let f = fixture();

    let response = f.public.get("/v1/genesis/list").await;
    assert_eq!(response.status_code(), 200);
    let json: Value = response.json();
    assert_eq!(json["chain_id"], 1);
    assert_eq!(json["mining_reward"], 700);

    let response = f.public.get("/v1/accounts/list").await;
    assert_eq!(response.status_code(), 200);
    let json: Value = response.json();
    assert_eq!(json["uncommitted"], 0);
    assert_eq!(json["accounts"].as_array().unwrap().len(), 1);
    assert_eq!(json["latest_block"], format!("0x{}", "0".repeat(64)));

    let path = format!("/v1/accounts/list/{}", f.alice.account_id());
    let json: Value = f.public.get(&path).await.json();
    assert_eq!(json["accounts"][0]["balance"], 1_000_000);

    let unknown = format!("/v1/accounts/list/{}", f.bob.account_id());
    assert_eq!(f.public.get(&unknown).await.status_code(), 404);
    assert_eq!(f.public.get("/v1/accounts/list/kenneth").await.status_code(), 400);
}

#[tokio::test]
async fn test_submit_and_list_uncommitted() {
    let f = fixture();
    let signed = UserTx::new(1, 1, f.alice.account_id(), f.bob.account_id(), 100, 2, vec![])
        .sign(&f.alice);

    let response = f.public.post("/v1/tx/submit").json(&signed).await;
    assert_eq!(response.status_code(), 200);
    let json: Value = response.json();
    assert_eq!(json["status"], "transactions added to mempool");

    let json: Value = f.public.get("/v1/tx/uncommitted/list").await.json();
    let list = json.as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["gas_price"], 15);
    assert_eq!(list[0]["nonce"], 1);
    assert!(list[0]["sig"].as_str().unwrap().starts_with("0x"));

    let path = format!("/v1/tx/uncommitted/list/{}", f.bob.account_id());
    let json: Value = f.public.get(&path).await.json();
    assert_eq!(json.as_array().unwrap().len(), 1);

    let stranger = format!("/v1/tx/uncommitted/list/{}", KeyPair::generate().account_id());
    let json: Value = f.public.get(&stranger).await.json();
    assert!(json.as_array().unwrap().is_empty());

    // Private view returns the full block transaction.
    let txs: Vec<BlockTx> = f.private.get("/v1/node/tx/list").await.json();
    assert_eq!(txs[0].from_id, f.alice.account_id());
}

#[tokio::test]
async fn test_forged_transaction_is_rejected() {
    let f = fixture();
    let mallory = KeyPair::generate();
    let forged = UserTx::new(1, 1, f.alice.account_id(), f.bob.account_id(), 100, 0, vec![])
        .sign(&mallory);

    let response = f.public.post("/v1/tx/submit").json(&forged).await;
    assert_eq!(response.status_code(), 400);
    let json: Value = response.json();
    assert!(json["error"].as_str().unwrap().contains("signature"));
    assert_eq!(f.state.mempool_length(), 0);
}

#[tokio::test]
async fn test_cancel_without_worker() {
    let f = fixture();
    let response = f.public.get("/v1/mining/cancel").await;
    assert_eq!(response.status_code(), 200);
    let json: Value = response.json();
    assert_eq!(json["status"], "cancelled");
}

#[tokio::test]
async fn test_status_and_peers() {
    let f = fixture();

    let response = f.private.post("/v1/node/peers").json(&Peer::new("10.0.0.2:9080")).await;
    assert_eq!(response.status_code(), 200);
    let json: Value = response.json();
    assert_eq!(json["status"], "added");

    let own = Peer::new("127.0.0.1:9080");
    let json: Value = f.private.post("/v1/node/peers").json(&own).await.json();
    assert_eq!(json["status"], "self");

    let status: PeerStatus = f.private.get("/v1/node/status").await.json();
    assert_eq!(status.latest_block_number, 0);
    assert_eq!(status.known_peers, vec![Peer::new("10.0.0.2:9080")]);
}

#[tokio::test]
async fn test_block_propose_and_list() {
    let f = fixture();

    // Another node on the same chain mines a block and proposes it.
    let miner = node(f.state.genesis().clone(), "127.0.0.1:9081");
    let signed = UserTx::new(1, 1, f.alice.account_id(), f.bob.account_id(), 100, 2, vec![])
        .sign(&f.alice);
    miner.upsert_wallet_transaction(signed).unwrap();
    let block = miner.mine_new_block(&CancelToken::new()).unwrap();
    let data = BlockData::from(&block);

    let response = f.private.post("/v1/node/block/propose").json(&data).await;
    assert_eq!(response.status_code(), 200);
    assert_eq!(f.state.latest_block().hash(), block.hash());

    // Proposing it again is out of sync.
    let response = f.private.post("/v1/node/block/propose").json(&data).await;
    assert_eq!(response.status_code(), 400);

    let blocks: Vec<BlockData> = f.private.get("/v1/node/block/list/1/latest").await.json();
    assert_eq!(blocks, vec![data.clone()]);

    let blocks: Vec<BlockData> = f.private.get("/v1/node/block/list/latest/latest").await.json();
    assert_eq!(blocks.len(), 1);

    assert_eq!(f.private.get("/v1/node/block/list/2/1").await.status_code(), 400);
    assert_eq!(f.private.get("/v1/node/block/list/one/2").await.status_code(), 400);

    let path = format!("/v1/accounts/list/{}", f.bob.account_id());
    let json: Value = f.public.get(&path).await.json();
    assert_eq!(json["accounts"][0]["balance"], 100);
}
