// tests/key_identity.rs
use intelligible_identity::did::{
    decode_fingerprint, derive_key_identity, encode_fingerprint, FingerprintEncoding, KeyResolver,
    LocalKeyResolver,
};
use intelligible_identity::KeyPairInput;

#[test]
fn supplied_keypair_resolves_to_its_own_document() {
    let mut private_key = vec![0u8; 32];
    private_key[31] = 1;
    let identity = tokio_test::block_on(derive_key_identity(
        Some(KeyPairInput {
            private_key: Some(private_key),
            public_key: None,
        }),
        &LocalKeyResolver,
    ))
    .unwrap();

    let fingerprint = identity.did.trim_start_matches("did:key:");
    assert_eq!(identity.key_id, format!("{}#{}", identity.did, fingerprint));

    let public_key = decode_fingerprint(fingerprint).unwrap();
    assert_eq!(
        encode_fingerprint(&public_key, FingerprintEncoding::Base58Btc),
        fingerprint
    );

    let resolved = tokio_test::block_on(LocalKeyResolver.resolve(&identity.did)).unwrap();
    assert_eq!(resolved, identity.document);
}
