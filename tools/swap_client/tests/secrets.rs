use sha2::{Digest, Sha256};
use swap_client::{LocalSigner, MessageSigner, SecretManager};

const KEY: &str = "0x0123456789012345678901234567890123456789012345678901234567890123";

async fn manager(key: &str) -> SecretManager {
    let signer = LocalSigner::from_hex(key).unwrap();
    SecretManager::from_signer(&signer).await.unwrap()
}

#[tokio::test]
async fn derivation_is_deterministic_per_wallet_and_index() {
    let first = manager(KEY).await;
    let second = manager(KEY.trim_start_matches("0x")).await;

    let a = first.derive_order_secret(1).unwrap();
    let b = second.derive_order_secret(1).unwrap();
    assert_eq!(a.secret(), b.secret());
    assert_eq!(a.hash(), b.hash());
    assert_eq!(first.master_priv_key(), second.master_priv_key());

    let next = first.derive_order_secret(2).unwrap();
    assert_ne!(a.secret(), next.secret());
}

#[tokio::test]
async fn different_wallets_get_different_secrets() {
    let first = manager(KEY).await;
    let other = manager("0x1111111111111111111111111111111111111111111111111111111111111111").await;
    assert_ne!(
        first.derive_order_secret(1).unwrap().secret(),
        other.derive_order_secret(1).unwrap().secret()
    );
}

#[tokio::test]
async fn commitment_is_sha256_of_secret() {
    let manager = manager(KEY).await;
    for index in [1u64, 7, 1_000] {
        let secret = manager.derive_order_secret(index).unwrap();
        let digest: [u8; 32] = Sha256::digest(secret.secret()).into();
        assert_eq!(secret.hash(), digest);
        assert!(secret.matches_hash(&secret.hash_hex()));
    }
}

#[tokio::test]
async fn bitcoin_address_follows_network() {
    let manager = manager(KEY).await;
    let testnet = manager.bitcoin_address(bitcoin::Network::Testnet).unwrap();
    let mainnet = manager.bitcoin_address(bitcoin::Network::Bitcoin).unwrap();
    assert!(testnet.starts_with("tb1q"));
    assert!(mainnet.starts_with("bc1q"));
    assert_eq!(testnet, manager.bitcoin_address(bitcoin::Network::Testnet).unwrap());
}

#[test]
fn rejects_malformed_private_key() {
    assert!(LocalSigner::from_hex("0xnot-a-key").is_err());
    let signer = LocalSigner::from_hex(KEY).unwrap();
    assert!(signer.address().starts_with("0x"));
}

#[tokio::test]
async fn bitcoin_identity_is_x_only_key() {
    let manager = manager(KEY).await;
    let key = manager.bitcoin_x_only_key(bitcoin::Network::Testnet).unwrap();
    assert_eq!(key.len(), 64);
    assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
}
