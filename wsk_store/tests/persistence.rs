use std::sync::Arc;
use tempfile::TempDir;
use wsk_common::{FileStore, Linkage, OutPoint, TrackedUtxo};
use wsk_store::{AccessCode, Store, TokenKind};

const HASH: &str = "aa04bdd30e0f7bb4dfa1c27d1a9d3d79c78ffd9ab7c78c978d0bd2742e837e01";

#[test]
fn reopen_restores_every_collection() {
    let tempdir = TempDir::new().unwrap();
    let datadir = tempdir.path().join("wsk");

    {
        let store = Store::open(Arc::new(FileStore::new(&datadir).unwrap())).unwrap();

        let mut linkage = Linkage::new(HASH.parse().unwrap());
        linkage.p2tr = Some("bc1p-alias".to_string());
        store
            .track(42, "bc1qprimary", "treasury", Some(linkage), 20, 1_700_000_000)
            .unwrap();

        store
            .seed_utxos(
                "bc1qprimary",
                vec![(
                    OutPoint::new("t0", 0),
                    TrackedUtxo {
                        address: "bc1qprimary".to_string(),
                        value: 500_000,
                    },
                )],
            )
            .unwrap();

        store
            .add_token_watch(42, "op1moto", "MOTO", TokenKind::Fungible, 5.0, 0)
            .unwrap();
        store
            .insert_access_code(AccessCode {
                code: "JT-ABC123DEF456".to_string(),
                redeemed: false,
                redeemed_by: None,
                expires_at: 2_000_000_000,
                duration_days: 30,
                funding_txid: None,
            })
            .unwrap();
        store.redeem_code("JT-ABC123DEF456", 42, 1_700_000_100).unwrap();
        store.record_seen_contract("bc1qprimary", "op1moto", false).unwrap();
        store.set_cursor(123_456).unwrap();
    }

    let store = Store::open(Arc::new(FileStore::new(&datadir).unwrap())).unwrap();

    assert_eq!(store.cursor(), 123_456);
    assert!(store.is_utxo_seeded("bc1qprimary"));

    let subs = store.subscriptions(42);
    assert_eq!(subs.len(), 1);
    assert_eq!(subs[0].address, "bc1qprimary");
    assert_eq!(subs[0].linkage.as_ref().unwrap().mldsa_hash.to_string(), HASH);

    let map = store.utxo_map();
    assert_eq!(map[&OutPoint::new("t0", 0)].value, 500_000);

    assert_eq!(store.token_watches(42).len(), 1);
    assert!(store.is_authorized(42));
    assert!(store.has_active_subscription(42, 1_700_000_200));
    assert_eq!(store.seen_contracts("bc1qprimary"), vec!["op1moto"]);

    let projection = store.identity_projection();
    assert!(projection.is_tracked("bc1p-alias"));
    assert_eq!(projection.canonicalize("bc1p-alias"), "bc1qprimary");
}
