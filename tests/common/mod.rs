// tests/common/mod.rs
#![allow(dead_code)]

use std::sync::Arc;

use ethers::types::Address;
use indexmap::IndexMap;
use intelligible_identity::models::{BodyBlock, ComponentData};
use intelligible_identity::{IdentityInformation, MemoryLedger, Reference, References};

pub const SUBJECT_DID: &str = "did:ethr:0x3f4c5d2a9b1e8f7a6d5c4b3a2f1e0d9c8b7a6f5e";

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Information and references of a sample identity whose subject
/// reference names the subject DID.
pub fn sample_identity() -> (IdentityInformation, References) {
    let mut information = IdentityInformation::new("2021-05-20", SUBJECT_DID);
    information.frbr_manifestation.components.push(ComponentData::new(
        "mavatar",
        "avatar.png",
        "avatar",
        "Avatar",
    ));

    let mut paragraphs = IndexMap::new();
    paragraphs.insert("bio".to_string(), "Researcher in distributed systems".to_string());
    paragraphs.insert("site".to_string(), "https://example.org/alice".to_string());
    information.additional_body.insert(
        "tblock_2".to_string(),
        BodyBlock {
            block_title: "Profile".to_string(),
            paragraphs,
        },
    );

    let mut references: References = IndexMap::new();
    references.insert("iid".to_string(), Reference::new(SUBJECT_DID));
    references.insert(
        "iidDIDDoc".to_string(),
        Reference::new("DID Document")
            .with_kind("TLCObject")
            .with_href("/diddoc.json"),
    );
    references.insert("iidIssuer".to_string(), Reference::new("Intelligible Registry"));
    references.insert(
        "avatar".to_string(),
        Reference::new("Avatar").with_kind("TLCObject").with_href("/avatar.png"),
    );
    (information, references)
}

pub fn ledger(chain_id: u64) -> (Arc<MemoryLedger>, Address, Address) {
    let ledger = MemoryLedger::new(chain_id, Address::repeat_byte(0x5a)).with_random_accounts(2);
    let accounts = ledger.accounts();
    (Arc::new(ledger), accounts[0], accounts[1])
}
