// tests/document_round_trip.rs
mod common;

use intelligible_identity::error::IdentityError;
use intelligible_identity::models::reference::REQUIRED_REFERENCES;
use intelligible_identity::IdentityMeta;

#[test]
fn parse_recovers_what_construct_wrote() {
    common::init_logging();
    let (information, references) = common::sample_identity();

    let meta = IdentityMeta::new(&information, &references).unwrap();
    let text = meta.finalize().unwrap();
    let loaded = IdentityMeta::from_text(&text).unwrap();
    let (parsed_information, parsed_references) =
        loaded.parse_information_and_references().unwrap().unwrap();

    assert_eq!(&parsed_information, meta.information().unwrap());
    assert_eq!(&parsed_references, meta.references().unwrap());

    assert_eq!(parsed_information.did, common::SUBJECT_DID);
    assert_eq!(parsed_information.identity_date, "2021-05-20");
    assert_eq!(parsed_information.additional_body["tblock_2"].block_title, "Profile");
    assert_eq!(
        parsed_references["iidDIDDoc"].href.as_deref(),
        Some("/diddoc.json")
    );
    assert_eq!(parsed_references["iidDIDDoc"].kind.as_deref(), Some("TLCObject"));
    assert_eq!(parsed_references["iid"].kind.as_deref(), Some("TLCPerson"));
    assert_eq!(parsed_references["avatar"].show_as.as_deref(), Some("avatar"));
}

#[test]
fn every_reserved_reference_is_required() {
    let (information, references) = common::sample_identity();
    for key in REQUIRED_REFERENCES {
        let mut incomplete = references.clone();
        incomplete.shift_remove(key);
        assert!(matches!(
            IdentityMeta::new(&information, &incomplete),
            Err(IdentityError::MissingRequiredReference(_))
        ));
    }
}

#[test]
fn loading_blank_text_is_malformed() {
    assert!(matches!(
        IdentityMeta::from_text("  "),
        Err(IdentityError::MalformedDocument(_))
    ));
}
