//! Reading mail back: handle resolution, decryption and listing.

use chainmail_core::{
    ChainmailConfig, CommitmentMapper, Error, IdentityId, MemoryStorage, Storage, commit,
};
use chainmail_crypto::{Envelope, MessageContent, RecipientSecretKey};
use chainmail_harness::{SimWorld, account_for};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

async fn send(
    world: &SimWorld,
    storage: &MemoryStorage,
    from: &str,
    to: &str,
    subject: &str,
) -> u64 {
    let content = MessageContent::new(from, to, subject, "body");
    world
        .dispatcher(storage.clone(), &ChainmailConfig::default())
        .dispatch(&content, account_for(from))
        .await
        .unwrap()
        .mail_id
}

#[tokio::test]
async fn receiver_opens_mail_indexed_by_ingestion() {
    let world = SimWorld::new(1);
    let secret = world.register_user("b@x");

    // Sender's node dispatches and publishes the handle externally
    let sender_storage = MemoryStorage::new();
    let mail_id = send(&world, &sender_storage, "a@x", "b@x", "hi").await;
    let handle = sender_storage.load_mail(mail_id).unwrap().unwrap().handle.unwrap();
    world.handle_index.publish(&handle);

    // Receiver's node only sees the ledger
    let receiver_storage = MemoryStorage::new();
    world
        .ingestor(receiver_storage.clone(), &ChainmailConfig::default())
        .catch_up()
        .await
        .unwrap();

    let content = world.mailbox(receiver_storage).open(mail_id, &secret).await.unwrap();
    assert_eq!(content.sender(), "a@x");
    assert_eq!(content.subject(), "hi");
}

#[tokio::test]
async fn handle_resolved_on_open_is_written_back() {
    let world = SimWorld::new(2);
    let secret = world.register_user("b@x");
    let sender_storage = MemoryStorage::new();
    let mail_id = send(&world, &sender_storage, "a@x", "b@x", "late").await;
    let handle = sender_storage.load_mail(mail_id).unwrap().unwrap().handle.unwrap();

    // Ingested before the handle was published anywhere
    let storage = MemoryStorage::new();
    world.ingestor(storage.clone(), &ChainmailConfig::default()).catch_up().await.unwrap();
    assert_eq!(storage.load_mail(mail_id).unwrap().unwrap().handle, None);

    world.handle_index.publish(&handle);
    let content = world.mailbox(storage.clone()).open(mail_id, &secret).await.unwrap();

    assert_eq!(content.subject(), "late");
    assert_eq!(storage.load_mail(mail_id).unwrap().unwrap().handle, Some(handle));
}

#[tokio::test]
async fn orphaned_commitment_is_handle_not_found() {
    let world = SimWorld::new(3);
    let secret = world.register_user("b@x");
    world.ledger.mine_mail("a@x", "b@x", commit("bafyNowhere"));
    let storage = MemoryStorage::new();
    world.ingestor(storage.clone(), &ChainmailConfig::default()).catch_up().await.unwrap();

    let err = world.mailbox(storage).open(1, &secret).await.unwrap_err();
    assert!(matches!(err, Error::HandleNotFound { .. }));
}

#[tokio::test]
async fn unknown_mail_id() {
    let world = SimWorld::new(4);
    let secret = world.register_user("b@x");

    let err = world.mailbox(MemoryStorage::new()).open(99, &secret).await.unwrap_err();
    assert!(matches!(err, Error::UnknownMail(99)));
}

#[tokio::test]
async fn tampered_envelope_is_integrity_error() {
    let world = SimWorld::new(5);
    let secret = world.register_user("b@x");
    let storage = MemoryStorage::new();
    let mail_id = send(&world, &storage, "a@x", "b@x", "hi").await;
    let handle = storage.load_mail(mail_id).unwrap().unwrap().handle.unwrap();

    let mut envelope = Envelope::from_json_bytes(&world.store.object(&handle).unwrap()).unwrap();
    envelope.encrypted_content.tag[0] ^= 0x01;
    world.store.tamper(&handle, envelope.to_json_bytes().unwrap());

    let err = world.mailbox(storage).open(mail_id, &secret).await.unwrap_err();
    assert!(matches!(err, Error::Integrity(_)));
}

#[tokio::test]
async fn wrong_key_is_integrity_error() {
    let world = SimWorld::new(6);
    world.register_user("b@x");
    let storage = MemoryStorage::new();
    let mail_id = send(&world, &storage, "a@x", "b@x", "hi").await;

    let stranger = RecipientSecretKey::generate(&mut ChaCha20Rng::seed_from_u64(99)).unwrap();
    let err = world.mailbox(storage).open(mail_id, &stranger).await.unwrap_err();
    assert!(matches!(err, Error::Integrity(_)));
}

#[tokio::test]
async fn garbage_bytes_are_a_crypto_encoding_error() {
    let world = SimWorld::new(7);
    let secret = world.register_user("b@x");
    let storage = MemoryStorage::new();
    let mail_id = send(&world, &storage, "a@x", "b@x", "hi").await;
    let handle = storage.load_mail(mail_id).unwrap().unwrap().handle.unwrap();
    world.store.tamper(&handle, b"not json".to_vec());

    let err = world.mailbox(storage).open(mail_id, &secret).await.unwrap_err();
    assert!(matches!(err, Error::Crypto(_)));
}

#[tokio::test]
async fn newer_envelope_version_is_reported_as_unsupported() {
    let world = SimWorld::new(10);
    let secret = world.register_user("b@x");
    let storage = MemoryStorage::new();
    let mail_id = send(&world, &storage, "a@x", "b@x", "hi").await;
    let handle = storage.load_mail(mail_id).unwrap().unwrap().handle.unwrap();
    world.store.tamper(&handle, br#"{"version":2,"recipients":[]}"#.to_vec());

    let err = world.mailbox(storage).open(mail_id, &secret).await.unwrap_err();
    assert!(matches!(err, Error::UnsupportedVersion(2)));
}

#[tokio::test]
async fn inbox_and_sent_are_ordered_by_id() {
    let world = SimWorld::new(8);
    world.register_user("a@x");
    world.register_user("b@x");
    world.register_user("c@x");
    let storage = MemoryStorage::new();

    send(&world, &storage, "a@x", "b@x", "1").await;
    send(&world, &storage, "c@x", "b@x", "2").await;
    send(&world, &storage, "b@x", "a@x", "3").await;
    send(&world, &storage, "a@x", "b@x", "4").await;

    let mailbox = world.mailbox(storage);
    let ids = |mail: Vec<chainmail_core::IndexedMail>| -> Vec<u64> {
        mail.iter().map(chainmail_core::IndexedMail::id).collect()
    };

    let b = IdentityId::from_email("b@x");
    let a = IdentityId::from_email("a@x");
    assert_eq!(ids(mailbox.inbox(&b).unwrap()), vec![1, 2, 4]);
    assert_eq!(ids(mailbox.sent(&a).unwrap()), vec![1, 4]);
    assert_eq!(ids(mailbox.inbox(&a).unwrap()), vec![3]);
    assert!(mailbox.get(3).unwrap().unwrap().involves(&a));
}

#[tokio::test]
async fn mismatched_external_handle_is_rejected() {
    let world = SimWorld::new(9);
    world.handle_index.insert(commit("bafyReal"), "bafyForged");
    let mapper = CommitmentMapper::new(MemoryStorage::new(), world.caps().handle_index);

    let err = mapper.resolve_or_fallback(&commit("bafyReal")).await.unwrap_err();
    assert!(matches!(err, Error::Integrity(_)));
}
