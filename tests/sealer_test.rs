mod support;

use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{Address, B256, U256};
use crossbeam_channel::bounded;
use secp256k1::{PublicKey, SecretKey};

use nuclear_consensus::crypto::{pubkey_to_address, sign_hash};
use nuclear_consensus::params::ONE_COIN;
use nuclear_consensus::types::{Block, Header};
use nuclear_consensus::{ChainConfig, MinerCallbacks};

use support::{governed_state, parent_header, prepared_child, test_engine, TestChain};

fn secret(byte: u8) -> SecretKey {
    SecretKey::from_slice(&[byte; 32]).expect("valid secret key")
}

fn address_of(key: &SecretKey) -> Address {
    pubkey_to_address(&PublicKey::from_secret_key_global(key).serialize_uncompressed())
}

fn miner_callbacks(accounts: Vec<Address>, key: SecretKey) -> MinerCallbacks {
    MinerCallbacks {
        accounts: Box::new(move || accounts.clone()),
        signer: Box::new(move |_, digest| sign_hash(&key, B256::from_slice(digest))),
        peer_count: Box::new(|| 1),
        is_mining: Box::new(|| true),
    }
}

#[test]
fn sealer_mines_signs_and_publishes() {
    let (engine, _clock, _dir) = test_engine();
    let chain = Arc::new(TestChain::new(ChainConfig::testnet()));
    let parent = parent_header(2);
    chain.insert(parent.clone());

    let key = secret(0x42);
    let coinbase = address_of(&key);
    chain.set_state(governed_state().with_balance(coinbase, U256::from(1_000) * ONE_COIN));
    engine.set_miner_callbacks(miner_callbacks(vec![coinbase], key));
    engine.set_miner_nonce_cap(3);

    let header = prepared_child(&engine, &chain, &parent);
    let work = Block::new(header, Vec::new(), Vec::new(), &[]);
    let (results_tx, results_rx) = bounded(1);
    let (_stop_tx, stop_rx) = bounded::<()>(1);
    engine
        .seal(chain.clone(), work.clone(), results_tx, stop_rx)
        .unwrap();

    let result = results_rx.recv_timeout(Duration::from_secs(10)).unwrap();
    let sealed = result.block.expect("sealed block");
    let sealed_header = sealed.header();

    assert_eq!(sealed_header.coinbase, coinbase);
    assert!(sealed_header.nonce <= 3);
    assert_eq!(sealed_header.signature.len(), 65);
    // Finalisation appended the reward consensus transaction.
    assert_eq!(sealed.transactions().len(), 1);
    assert_eq!(result.receipts.len(), 1);

    engine.verify_seal(chain.as_ref(), sealed_header).unwrap();
    engine
        .verify_header(chain.as_ref(), sealed_header, true)
        .unwrap();

    // The published block still answers to the original work item's seal
    // hash, even though finalisation replaced the transactions root.
    assert_eq!(
        engine.seal_hash(sealed_header),
        engine.seal_hash(work.header())
    );
}

#[test]
fn sealer_reports_failure_when_stopped() {
    let (engine, _clock, _dir) = test_engine();
    let chain = Arc::new(TestChain::new(ChainConfig::testnet()));
    let parent = parent_header(2);
    chain.insert(parent.clone());

    let key = secret(0x42);
    let broke = address_of(&key);
    // No stake, so the search can never succeed.
    chain.set_state(governed_state());
    engine.set_miner_callbacks(miner_callbacks(vec![broke], key));

    let header = prepared_child(&engine, &chain, &parent);
    let work = Block::new(header, Vec::new(), Vec::new(), &[]);
    let (results_tx, results_rx) = bounded(1);
    let (stop_tx, stop_rx) = bounded::<()>(1);
    engine.seal(chain, work, results_tx, stop_rx).unwrap();
    stop_tx.send(()).unwrap();

    let result = results_rx.recv_timeout(Duration::from_secs(10)).unwrap();
    assert!(result.block.is_none());
    assert!(result.receipts.is_empty());
}

#[test]
fn genesis_is_signed_without_mining() {
    let (engine, _clock, _dir) = test_engine();
    let chain = Arc::new(TestChain::new(ChainConfig::testnet()));
    let key = secret(0x42);
    engine.set_miner_callbacks(miner_callbacks(vec![address_of(&key)], key));

    let genesis = Block::new(Header::default(), Vec::new(), Vec::new(), &[]);
    let (results_tx, results_rx) = bounded(1);
    let (_stop_tx, stop_rx) = bounded::<()>(1);
    engine.seal(chain, genesis, results_tx, stop_rx).unwrap();

    let result = results_rx.recv_timeout(Duration::from_secs(10)).unwrap();
    let sealed = result.block.expect("signed genesis");
    assert_eq!(sealed.header().number, 0);
    assert_eq!(sealed.header().signature.len(), 65);
    assert!(sealed.transactions().is_empty());
}

#[test]
#[should_panic(expected = "miner callbacks must be set only once")]
fn miner_callbacks_cannot_be_set_twice() {
    let (engine, _clock, _dir) = test_engine();
    let key = secret(0x42);
    engine.set_miner_callbacks(miner_callbacks(Vec::new(), key));
    let other = secret(0x43);
    engine.set_miner_callbacks(miner_callbacks(Vec::new(), other));
}
