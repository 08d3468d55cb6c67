// tests/identity_lifecycle.rs
mod common;

use intelligible_identity::error::IdentityError;
use intelligible_identity::storage::{directory_locator, ContentStore};
use intelligible_identity::{Identity, MemoryLedger, MemoryStore, NftDid, Stage};

#[tokio::test]
async fn issue_publish_and_reconstruct() {
    common::init_logging();
    let (ledger, main, holder) = common::ledger(5);
    let (information, references) = common::sample_identity();

    let prepared = Identity::new()
        .prepare(ledger.clone(), main, Some(holder))
        .await
        .unwrap();
    assert_eq!(prepared.stage(), Stage::Reserved);
    let nft_did = prepared.nft_did().await.unwrap();

    let built = prepared
        .attach_information(&information, &references)
        .unwrap()
        .build_metadata()
        .unwrap();
    let digest = built.metadata_digest().unwrap();
    let signed = built.sign(&digest, Some(false)).await.unwrap();
    assert_eq!(signed.stage(), Stage::Signed);
    let record = signed.signature().unwrap().latest().unwrap().clone();
    assert_eq!(record.signer, "#iidIssuer");
    assert_eq!(record.signer_label, "Intelligible Registry");

    let store = MemoryStore::new();
    let entries = store.put(signed.package().unwrap()).await.unwrap();
    let locator = directory_locator(&entries, "main.xml").unwrap();
    let finalized = signed.finalize(&locator).await.unwrap();
    assert_eq!(finalized.stage(), Stage::Finalized);
    assert_eq!(finalized.locator(), Some(locator.as_str()));

    // Reverse path: the holder's last token leads back to the package.
    let resolved = Identity::from_address(ledger.clone(), main, Some(holder))
        .await
        .unwrap();
    assert_eq!(resolved.stage(), Stage::LocatorResolved);
    assert_eq!(resolved.locator(), Some(locator.as_str()));
    assert_eq!(resolved.token_id(), Some(nft_did.token_id));

    let by_did = Identity::from_nft_did(ledger.clone(), main, &nft_did.to_string())
        .await
        .unwrap();
    assert_eq!(by_did.locator(), Some(locator.as_str()));

    let restored: Identity<MemoryLedger> = Identity::from_store(&store, &locator).await.unwrap();
    assert_eq!(restored.stage(), Stage::InformationSet);
    assert_eq!(restored.information().unwrap().did, common::SUBJECT_DID);
    assert_eq!(restored.signature().unwrap().latest(), Some(&record));

    let fetched_digest = restored.metadata_digest().unwrap();
    assert_eq!(fetched_digest, digest);
    let verifier = restored.with_web3(ledger.clone(), main);
    assert!(verifier.verify(&digest, Some(false)).unwrap());
    assert!(verifier.verify(&digest, Some(true)).unwrap());
    assert!(!restored
        .with_web3(ledger, holder)
        .verify(&digest, Some(false))
        .unwrap());
}

#[tokio::test]
async fn transitions_leave_earlier_values_untouched() {
    let (ledger, main, _) = common::ledger(1);
    let (information, references) = common::sample_identity();

    let empty = Identity::new();
    let prepared = empty.prepare(ledger, main, None).await.unwrap();
    let attached = prepared.attach_information(&information, &references).unwrap();

    assert_eq!(empty.stage(), Stage::Empty);
    assert!(empty.token_id().is_none());
    assert_eq!(prepared.stage(), Stage::Reserved);
    assert!(prepared.information().is_none());
    assert_eq!(attached.stage(), Stage::InformationSet);
}

#[tokio::test]
async fn out_of_order_transitions_fail() {
    let (ledger, main, _) = common::ledger(1);
    let (information, references) = common::sample_identity();
    let attached = Identity::new()
        .prepare(ledger, main, None)
        .await
        .unwrap()
        .attach_information(&information, &references)
        .unwrap();

    assert!(matches!(
        attached.sign("0xabc", None).await,
        Err(IdentityError::PreconditionFailed(_))
    ));
    let built = attached.build_metadata().unwrap();
    assert!(matches!(
        built.finalize("locator").await,
        Err(IdentityError::PreconditionFailed(_))
    ));
    assert!(matches!(
        built.sign("", None).await,
        Err(IdentityError::PreconditionFailed(_))
    ));
}

#[tokio::test]
async fn unknown_tokens_surface_ledger_errors() {
    let (ledger, main, holder) = common::ledger(1);
    assert!(matches!(
        Identity::from_address(ledger.clone(), main, Some(holder)).await,
        Err(IdentityError::Collaborator(_))
    ));

    let did = NftDid::new(1, ledger_contract(), 99u64.into()).to_string();
    assert!(matches!(
        Identity::from_nft_did(ledger, main, &did).await,
        Err(IdentityError::Collaborator(_))
    ));
}

fn ledger_contract() -> ethers::types::Address {
    ethers::types::Address::repeat_byte(0x5a)
}
