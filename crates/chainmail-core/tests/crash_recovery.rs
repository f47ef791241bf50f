//! Restart behavior with `RedbStorage`.
//!
//! An ingestor that reopens its database resumes from the persisted cursor
//! and keeps every handle it resolved before the restart.

use chainmail_core::{ChainmailConfig, RedbStorage, Storage, commit};
use chainmail_harness::SimWorld;
use tempfile::tempdir;

#[tokio::test]
async fn ingestion_resumes_after_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("index.redb");
    let world = SimWorld::new(1);
    let config = ChainmailConfig::default();

    for block in 1..=4 {
        let handle = format!("bafy{block}");
        world.handle_index.publish(&handle);
        world.ledger.mine_mail("a@x", "b@x", commit(&handle));
    }

    {
        let storage = RedbStorage::open(&path).unwrap();
        let report = world.ingestor(storage, &config).catch_up().await.unwrap();
        assert_eq!(report.to_block, 4);
    }

    world.ledger.mine_mail("a@x", "b@x", commit("bafy5"));

    let storage = RedbStorage::open(&path).unwrap();
    assert_eq!(storage.sync_cursor().unwrap(), Some(4));

    let report = world.ingestor(storage.clone(), &config).catch_up().await.unwrap();
    assert_eq!(report.from_block, 4);
    assert_eq!(report.to_block, 5);
    assert_eq!(report.changed, 1);

    let mail = storage.list_mail().unwrap();
    assert_eq!(mail.len(), 5);
    assert_eq!(mail[0].handle.as_deref(), Some("bafy1"));
    assert_eq!(mail[4].handle, None);
    assert_eq!(storage.lookup_handle(&commit("bafy4")).unwrap().as_deref(), Some("bafy4"));
}

#[tokio::test]
async fn dispatched_mail_survives_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("index.redb");
    let world = SimWorld::new(2);
    let secret = world.register_user("b@x");
    let content = chainmail_crypto::MessageContent::new("a@x", "b@x", "kept", "body");

    let receipt = {
        let storage = RedbStorage::open(&path).unwrap();
        world
            .dispatcher(storage, &ChainmailConfig::default())
            .dispatch(&content, chainmail_harness::account_for("a@x"))
            .await
            .unwrap()
    };

    let storage = RedbStorage::open(&path).unwrap();
    let opened = world.mailbox(storage).open(receipt.mail_id, &secret).await.unwrap();
    assert_eq!(opened.subject(), "kept");
}
