// src/services/identity.rs
//! Identity lifecycle orchestrator.
//!
//! An [`Identity`] is an immutable value; every transition borrows the
//! current value and returns the next one:
//!
//! ```text
//! Empty --prepare--> Reserved --attach_information--> InformationSet
//!   --build_metadata--> MetadataBuilt --sign--> Signed --finalize--> Finalized
//! ```
//!
//! Reconstruction entry points (`from_address`, `from_token_id`,
//! `from_nft_did`, `from_document_text`, `from_signature_text`,
//! `from_store`) rebuild an identity from the ledger or from stored text.

use std::fmt;
use std::sync::Arc;

use ethers::types::{Address, U256};

use crate::blockchain::Ledger;
use crate::did::NftDid;
use crate::document::IdentityMeta;
use crate::error::{IdentityError, Result};
use crate::models::information::IdentityInformation;
use crate::models::reference::{References, IDENTITY_ISSUER};
use crate::models::signature::SignatureDocument;
use crate::services::signature::{verify, SignatureProtocol};
use crate::storage::{sibling_locator, ContentStore, StoredFile};
use crate::utils::crypto::{hash_data, to_lower_hex};

/// File name of the metadata document inside a published package.
pub const METADATA_FILE_NAME: &str = "main.xml";
/// File name of the signature document, next to the metadata document.
pub const SIGNATURE_FILE_NAME: &str = "signature.xml";
/// Element reference recorded as the signer when the issuer has no `eId`.
pub const ISSUER_SIGNER_REF: &str = "#iidIssuer";

/// Lifecycle position of an [`Identity`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Empty,
    Reserved,
    InformationSet,
    MetadataBuilt,
    Signed,
    Finalized,
    LocatorResolved,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Empty => "empty",
            Stage::Reserved => "reserved",
            Stage::InformationSet => "information set",
            Stage::MetadataBuilt => "metadata built",
            Stage::Signed => "signed",
            Stage::Finalized => "finalized",
            Stage::LocatorResolved => "locator resolved",
        };
        f.write_str(name)
    }
}

/// Ledger binding of an identity.
pub struct Web3Binding<L: Ledger> {
    pub ledger: Arc<L>,
    /// Account that reserves, signs and mints.
    pub main_address: Option<Address>,
    /// Account the identity token belongs to.
    pub address: Address,
    pub token_id: Option<U256>,
}

impl<L: Ledger> Clone for Web3Binding<L> {
    fn clone(&self) -> Self {
        Self {
            ledger: Arc::clone(&self.ledger),
            main_address: self.main_address,
            address: self.address,
            token_id: self.token_id,
        }
    }
}

/// An intelligible identity and the documents that compose it.
pub struct Identity<L: Ledger> {
    stage: Stage,
    web3: Option<Web3Binding<L>>,
    meta: Option<IdentityMeta>,
    information: Option<IdentityInformation>,
    references: Option<References>,
    hash_digest: Option<String>,
    signature: Option<SignatureDocument>,
    locator: Option<String>,
}

impl<L: Ledger> Clone for Identity<L> {
    fn clone(&self) -> Self {
        Self {
            stage: self.stage,
            web3: self.web3.clone(),
            meta: self.meta.clone(),
            information: self.information.clone(),
            references: self.references.clone(),
            hash_digest: self.hash_digest.clone(),
            signature: self.signature.clone(),
            locator: self.locator.clone(),
        }
    }
}

impl<L: Ledger> Default for Identity<L> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L: Ledger> fmt::Debug for Identity<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("stage", &self.stage)
            .field("address", &self.address())
            .field("token_id", &self.token_id())
            .field("hash_digest", &self.hash_digest)
            .field("locator", &self.locator)
            .finish()
    }
}

impl<L: Ledger> Identity<L> {
    /// An identity with nothing bound yet.
    pub fn new() -> Self {
        Self {
            stage: Stage::Empty,
            web3: None,
            meta: None,
            information: None,
            references: None,
            hash_digest: None,
            signature: None,
            locator: None,
        }
    }

    fn advanced(&self, stage: Stage) -> Self {
        let mut next = self.clone();
        next.stage = stage;
        next
    }

    fn expect_stage(&self, allowed: &[Stage], action: &str) -> Result<()> {
        if allowed.contains(&self.stage) {
            Ok(())
        } else {
            Err(IdentityError::precondition(format!(
                "cannot {} an identity that is {}",
                action, self.stage
            )))
        }
    }

    fn binding(&self) -> Result<&Web3Binding<L>> {
        self.web3
            .as_ref()
            .ok_or_else(|| IdentityError::precondition("the identity has no ledger binding"))
    }

    fn reserved_binding(&self) -> Result<(&Web3Binding<L>, U256)> {
        let binding = self.binding()?;
        let token_id = binding
            .token_id
            .ok_or_else(|| IdentityError::precondition("no token id has been reserved"))?;
        Ok((binding, token_id))
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn meta(&self) -> Option<&IdentityMeta> {
        self.meta.as_ref()
    }

    pub fn information(&self) -> Option<&IdentityInformation> {
        self.information.as_ref()
    }

    pub fn references(&self) -> Option<&References> {
        self.references.as_ref()
    }

    pub fn hash_digest(&self) -> Option<&str> {
        self.hash_digest.as_deref()
    }

    pub fn signature(&self) -> Option<&SignatureDocument> {
        self.signature.as_ref()
    }

    /// Content locator bound to the token, once finalized or resolved.
    pub fn locator(&self) -> Option<&str> {
        self.locator.as_deref()
    }

    pub fn address(&self) -> Option<Address> {
        self.web3.as_ref().map(|w| w.address)
    }

    pub fn main_address(&self) -> Option<Address> {
        self.web3.as_ref().and_then(|w| w.main_address)
    }

    pub fn token_id(&self) -> Option<U256> {
        self.web3.as_ref().and_then(|w| w.token_id)
    }

    /// Binds the ledger and main address and reserves a token id.
    ///
    /// The token goes to `recipient`, or to `main_address` when omitted.
    ///
    /// # Errors
    /// - [`IdentityError::PreconditionFailed`] unless the identity is empty
    /// - [`IdentityError::Collaborator`] if the reservation fails
    pub async fn prepare(
        &self,
        ledger: Arc<L>,
        main_address: Address,
        recipient: Option<Address>,
    ) -> Result<Self> {
        self.expect_stage(&[Stage::Empty], "reserve a token for")?;
        if self.web3.is_some() {
            return Err(IdentityError::precondition(
                "the identity is already bound to a ledger",
            ));
        }

        let token_id = ledger.reserve_token_id(main_address).await?;
        let address = recipient.unwrap_or(main_address);
        log::info!(
            "reserved identity token {} for {:?} (recipient {:?})",
            token_id,
            main_address,
            address
        );

        let mut next = self.advanced(Stage::Reserved);
        next.web3 = Some(Web3Binding {
            ledger,
            main_address: Some(main_address),
            address,
            token_id: Some(token_id),
        });
        Ok(next)
    }

    /// Attaches the identity's information and references.
    ///
    /// # Errors
    /// [`IdentityError::PreconditionFailed`] if information is already
    /// attached; call [`Identity::reset_information`] first.
    pub fn attach_information(&self, information: &IdentityInformation, references: &References) -> Result<Self> {
        if self.information.is_some() || self.references.is_some() {
            return Err(IdentityError::precondition(
                "information is already attached, reset it first",
            ));
        }
        self.expect_stage(&[Stage::Empty, Stage::Reserved], "attach information to")?;

        log::info!(
            "attached information for {} with {} references",
            information.did,
            references.len()
        );
        let mut next = self.advanced(Stage::InformationSet);
        next.information = Some(information.clone());
        next.references = Some(references.clone());
        Ok(next)
    }

    /// Drops the information and everything derived from it.
    pub fn reset_information(&self) -> Result<Self> {
        if self.stage == Stage::Finalized {
            return Err(IdentityError::precondition(
                "a finalized identity cannot be changed",
            ));
        }
        let stage = if self.token_id().is_some() {
            Stage::Reserved
        } else {
            Stage::Empty
        };
        log::info!("reset identity information, back to {}", stage);

        let mut next = self.advanced(stage);
        next.information = None;
        next.references = None;
        next.meta = None;
        next.hash_digest = None;
        next.signature = None;
        Ok(next)
    }

    /// Builds the metadata document from the attached information.
    ///
    /// # Errors
    /// - [`IdentityError::PreconditionFailed`] if no information is attached
    /// - any error of [`IdentityMeta::new`]
    pub fn build_metadata(&self) -> Result<Self> {
        let (information, references) = match (&self.information, &self.references) {
            (Some(information), Some(references)) => (information, references),
            _ => {
                return Err(IdentityError::precondition(
                    "identity information and references must be attached first",
                ))
            }
        };
        self.expect_stage(&[Stage::InformationSet, Stage::MetadataBuilt], "build metadata for")?;

        let meta = IdentityMeta::new(information, references)?;
        log::info!("built metadata document for {}", information.did);

        let mut next = self.advanced(Stage::MetadataBuilt);
        next.meta = Some(meta);
        Ok(next)
    }

    /// Keccak-256 of the serialized metadata document, `0x`-prefixed.
    pub fn metadata_digest(&self) -> Result<String> {
        let meta = self
            .meta
            .as_ref()
            .ok_or_else(|| IdentityError::precondition("the metadata document is not built"))?;
        Ok(to_lower_hex(&hash_data(meta.finalize()?.as_bytes())))
    }

    /// Signs `digest` with the main address on behalf of the issuer.
    ///
    /// `personal` selects the personal-message scheme (default) or the
    /// plain `eth_sign` scheme.
    ///
    /// # Errors
    /// [`IdentityError::PreconditionFailed`] if the metadata is not built,
    /// the digest is empty or no token has been reserved.
    pub async fn sign(&self, digest: &str, personal: Option<bool>) -> Result<Self> {
        self.expect_stage(&[Stage::MetadataBuilt], "sign")?;
        if digest.is_empty() {
            return Err(IdentityError::precondition("the hash digest is not set"));
        }
        let (binding, _) = self.reserved_binding()?;
        let issuer = self
            .meta
            .as_ref()
            .and_then(IdentityMeta::references)
            .and_then(|refs| refs.get(IDENTITY_ISSUER))
            .ok_or_else(|| IdentityError::MissingRequiredReference(IDENTITY_ISSUER.to_string()))?;

        let protocol = SignatureProtocol::new(Arc::clone(&binding.ledger), binding.main_address);
        let record = protocol
            .sign(
                digest,
                personal,
                issuer.e_id.as_deref().unwrap_or(ISSUER_SIGNER_REF),
                &issuer.entity,
            )
            .await?;
        log::info!("signed identity digest {} as {}", digest, issuer.entity);

        let mut signature = SignatureDocument::new();
        signature.add_signature(record);
        let mut next = self.advanced(Stage::Signed);
        next.hash_digest = Some(digest.to_string());
        next.signature = Some(signature);
        Ok(next)
    }

    /// Serialized metadata and signature documents, ready to publish.
    pub fn package(&self) -> Result<Vec<StoredFile>> {
        let meta = self
            .meta
            .as_ref()
            .ok_or_else(|| IdentityError::precondition("the metadata document is not built"))?;
        let signature = self
            .signature
            .as_ref()
            .ok_or_else(|| IdentityError::precondition("the identity is not signed"))?;
        Ok(vec![
            StoredFile::new(METADATA_FILE_NAME, meta.finalize()?),
            StoredFile::new(SIGNATURE_FILE_NAME, signature.finalize()?),
        ])
    }

    /// Mints the reserved token with `locator` as its URI.
    ///
    /// # Errors
    /// - [`IdentityError::PreconditionFailed`] unless the identity is signed
    /// - [`IdentityError::Collaborator`] if minting fails
    pub async fn finalize(&self, locator: &str) -> Result<Self> {
        self.expect_stage(&[Stage::Signed], "finalize")?;
        let (binding, token_id) = self.reserved_binding()?;
        let owner = binding
            .main_address
            .ok_or_else(|| IdentityError::precondition("a main address is needed to mint"))?;

        binding
            .ledger
            .mint_reserved(owner, token_id, binding.address, locator)
            .await?;
        log::info!(
            "finalized identity token {} for {:?} at {}",
            token_id,
            binding.address,
            locator
        );

        let mut next = self.advanced(Stage::Finalized);
        next.locator = Some(locator.to_string());
        Ok(next)
    }

    /// NFT DID of the reserved identity token.
    pub async fn nft_did(&self) -> Result<NftDid> {
        let (binding, token_id) = self.reserved_binding()?;
        let chain_id = binding.ledger.chain_id().await?;
        Ok(NftDid::new(chain_id, binding.ledger.contract_address(), token_id))
    }

    fn resolved(web3: Web3Binding<L>, locator: String) -> Self {
        let mut identity = Self::new().advanced(Stage::LocatorResolved);
        identity.web3 = Some(web3);
        identity.locator = Some(locator);
        identity
    }

    /// Resolves the last identity token issued to `holder` (or to
    /// `main_address`) and its content locator.
    pub async fn from_address(ledger: Arc<L>, main_address: Address, holder: Option<Address>) -> Result<Self> {
        let address = holder.unwrap_or(main_address);
        let token_id = ledger.last_token_of(address).await?;
        let locator = ledger.token_uri(token_id).await?;
        log::info!("resolved token {} of {:?} to {}", token_id, address, locator);

        Ok(Self::resolved(
            Web3Binding {
                ledger,
                main_address: Some(main_address),
                address,
                token_id: Some(token_id),
            },
            locator,
        ))
    }

    /// Resolves the content locator of `token_id`.
    pub async fn from_token_id(ledger: Arc<L>, main_address: Address, token_id: U256) -> Result<Self> {
        let locator = ledger.token_uri(token_id).await?;
        log::info!("resolved token {} to {}", token_id, locator);

        Ok(Self::resolved(
            Web3Binding {
                ledger,
                main_address: Some(main_address),
                address: main_address,
                token_id: Some(token_id),
            },
            locator,
        ))
    }

    /// Resolves the content locator of the token named by an NFT DID.
    ///
    /// # Errors
    /// - [`IdentityError::MalformedIdentifier`] if `nft_did` does not parse
    /// - [`IdentityError::InvalidArgument`] if it names another contract or
    ///   chain than `ledger`
    pub async fn from_nft_did(ledger: Arc<L>, main_address: Address, nft_did: &str) -> Result<Self> {
        let did: NftDid = nft_did.parse()?;
        if did.contract != ledger.contract_address() {
            return Err(IdentityError::InvalidArgument(format!(
                "{} names contract {:?}, the ledger is bound to {:?}",
                nft_did,
                did.contract,
                ledger.contract_address()
            )));
        }
        let chain_id = ledger.chain_id().await?;
        if did.chain_id != chain_id {
            return Err(IdentityError::InvalidArgument(format!(
                "{} names chain {}, the ledger is on chain {}",
                nft_did, did.chain_id, chain_id
            )));
        }
        Self::from_token_id(ledger, main_address, did.token_id).await
    }

    /// Loads a metadata document and recovers its information and
    /// references.
    pub fn from_document_text(text: &str) -> Result<Self> {
        let meta = IdentityMeta::from_text(text)?;
        let (information, references) = meta
            .parse_information_and_references()?
            .ok_or_else(|| IdentityError::malformed_document("the document has no content"))?;
        log::info!("loaded identity document for {}", information.did);

        let mut identity = Self::new().advanced(Stage::InformationSet);
        identity.meta = Some(meta);
        identity.information = Some(information);
        identity.references = Some(references);
        Ok(identity)
    }

    /// An identity holding only a parsed signature document.
    pub fn from_signature_text(text: &str) -> Result<Self> {
        Self::new().attach_signature_text(text)
    }

    /// Attaches a parsed signature document without changing the stage.
    pub fn attach_signature_text(&self, text: &str) -> Result<Self> {
        let signature = SignatureDocument::from_text(text)?;
        log::debug!("attached {} signature records", signature.signatures().len());
        let mut next = self.clone();
        next.signature = Some(signature);
        Ok(next)
    }

    /// Fetches the metadata document at `locator` and the signature
    /// document next to it, and reconstructs both.
    pub async fn from_store<S>(store: &S, locator: &str) -> Result<Self>
    where
        S: ContentStore + ?Sized,
    {
        let document = store.get(locator).await?;
        let signature = store
            .get(&sibling_locator(locator, SIGNATURE_FILE_NAME))
            .await?;
        let mut identity = Self::from_document_text(&document)?.attach_signature_text(&signature)?;
        identity.locator = Some(locator.to_string());
        Ok(identity)
    }

    /// Binds a ledger and the identity's address, typically after
    /// reconstruction, so that signatures can be checked.
    pub fn with_web3(&self, ledger: Arc<L>, address: Address) -> Self {
        let mut next = self.clone();
        let token_id = self.token_id();
        next.web3 = Some(Web3Binding {
            ledger,
            main_address: self.main_address(),
            address,
            token_id,
        });
        next
    }

    /// Checks the latest signature record against the bound address.
    ///
    /// # Errors
    /// [`IdentityError::PreconditionFailed`] without a bound address, a
    /// signature record or a digest.
    pub fn verify(&self, digest: &str, personal: Option<bool>) -> Result<bool> {
        let address = self
            .address()
            .ok_or_else(|| IdentityError::precondition("bind an address with with_web3 first"))?;
        let record = self
            .signature
            .as_ref()
            .and_then(SignatureDocument::latest)
            .ok_or_else(|| IdentityError::precondition("the identity carries no signature"))?;
        let valid = verify(digest, &record.value, address, personal)?;
        log::info!(
            "signature of {} for {:?} is {}",
            record.signer_label,
            address,
            if valid { "valid" } else { "invalid" }
        );
        Ok(valid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::MemoryLedger;
    use crate::models::reference::Reference;
    use indexmap::IndexMap;

    fn sample() -> (IdentityInformation, References) {
        let information = IdentityInformation::new("2021-03-12", "did:ethr:0x01");
        let mut references: References = IndexMap::new();
        references.insert("iid".into(), Reference::new("Alice"));
        references.insert(
            "iidDIDDoc".into(),
            Reference::new("DID Document").with_kind("TLCObject"),
        );
        references.insert("iidIssuer".into(), Reference::new("Issuer Org"));
        (information, references)
    }

    fn ledger() -> (Arc<MemoryLedger>, Address) {
        let ledger = MemoryLedger::new(5, Address::repeat_byte(0x42)).with_random_accounts(1);
        let main = ledger.accounts()[0];
        (Arc::new(ledger), main)
    }

    #[test]
    fn sign_before_build_metadata_fails() {
        let (information, references) = sample();
        let identity = Identity::<MemoryLedger>::new()
            .attach_information(&information, &references)
            .unwrap();
        let result = tokio_test::block_on(identity.sign("0x01", None));
        assert!(matches!(result, Err(IdentityError::PreconditionFailed(_))));
    }

    #[tokio::test]
    async fn finalize_before_sign_fails() {
        let (ledger, main) = ledger();
        let (information, references) = sample();
        let identity = Identity::new()
            .prepare(ledger, main, None)
            .await
            .unwrap()
            .attach_information(&information, &references)
            .unwrap()
            .build_metadata()
            .unwrap();
        assert!(matches!(
            identity.finalize("cid/main.xml").await,
            Err(IdentityError::PreconditionFailed(_))
        ));
    }

    #[tokio::test]
    async fn signing_requires_a_reserved_token() {
        let (information, references) = sample();
        let identity = Identity::<MemoryLedger>::new()
            .attach_information(&information, &references)
            .unwrap()
            .build_metadata()
            .unwrap();
        let digest = identity.metadata_digest().unwrap();
        assert!(matches!(
            identity.sign(&digest, None).await,
            Err(IdentityError::PreconditionFailed(_))
        ));
    }

    #[tokio::test]
    async fn information_must_be_reset_before_reattaching() {
        let (ledger, main) = ledger();
        let (information, references) = sample();
        let attached = Identity::new()
            .prepare(ledger, main, None)
            .await
            .unwrap()
            .attach_information(&information, &references)
            .unwrap();
        assert!(matches!(
            attached.attach_information(&information, &references),
            Err(IdentityError::PreconditionFailed(_))
        ));

        let reset = attached.reset_information().unwrap();
        assert_eq!(reset.stage(), Stage::Reserved);
        assert!(reset.information().is_none());
        assert!(reset.attach_information(&information, &references).is_ok());
        assert_eq!(attached.stage(), Stage::InformationSet);
    }

    #[tokio::test]
    async fn prepare_twice_fails_and_recipient_defaults_to_main() {
        let (ledger, main) = ledger();
        let prepared = Identity::new().prepare(ledger.clone(), main, None).await.unwrap();
        assert_eq!(prepared.address(), Some(main));
        assert_eq!(prepared.token_id(), Some(U256::one()));
        assert!(matches!(
            prepared.prepare(ledger, main, None).await,
            Err(IdentityError::PreconditionFailed(_))
        ));
    }

    #[tokio::test]
    async fn build_metadata_without_information_fails() {
        let (ledger, main) = ledger();
        let prepared = Identity::new().prepare(ledger, main, None).await.unwrap();
        assert!(matches!(
            prepared.build_metadata(),
            Err(IdentityError::PreconditionFailed(_))
        ));
    }

    #[tokio::test]
    async fn nft_did_names_the_reserved_token() {
        let (ledger, main) = ledger();
        let prepared = Identity::new().prepare(ledger, main, None).await.unwrap();
        let did = prepared.nft_did().await.unwrap();
        assert_eq!(did.chain_id, 5);
        assert_eq!(did.contract, Address::repeat_byte(0x42));
        assert_eq!(did.token_id, U256::one());
    }

    #[tokio::test]
    async fn from_nft_did_rejects_another_contract() {
        let (ledger, main) = ledger();
        let other = NftDid::new(5, Address::repeat_byte(0x01), U256::one()).to_string();
        assert!(matches!(
            Identity::from_nft_did(ledger.clone(), main, &other).await,
            Err(IdentityError::InvalidArgument(_))
        ));
        assert!(matches!(
            Identity::from_nft_did(ledger, main, "did:nft:broken").await,
            Err(IdentityError::MalformedIdentifier(_))
        ));
    }

    #[tokio::test]
    async fn signature_names_the_issuer_element() {
        let (ledger, main) = ledger();
        let (information, mut references) = sample();
        references.insert(
            "iidIssuer".into(),
            Reference {
                e_id: Some("#registry".into()),
                ..Reference::new("Issuer Org")
            },
        );
        let built = Identity::new()
            .prepare(ledger, main, None)
            .await
            .unwrap()
            .attach_information(&information, &references)
            .unwrap()
            .build_metadata()
            .unwrap();
        let digest = built.metadata_digest().unwrap();
        let signed = built.sign(&digest, None).await.unwrap();

        let record = signed.signature().unwrap().latest().unwrap();
        assert_eq!(record.signer, "#registry");
        assert!(signed.meta().unwrap().tree().find_by_eid(&record.signer).is_some());
    }

    #[tokio::test]
    async fn document_text_rebuilds_identical_metadata() {
        let (ledger, main) = ledger();
        let (information, references) = sample();
        let built = Identity::new()
            .prepare(ledger.clone(), main, None)
            .await
            .unwrap()
            .attach_information(&information, &references)
            .unwrap()
            .build_metadata()
            .unwrap();
        let text = built.meta().unwrap().finalize().unwrap();

        let rebuilt = Identity::<MemoryLedger>::from_document_text(&text)
            .unwrap()
            .build_metadata()
            .unwrap();
        assert_eq!(rebuilt.stage(), Stage::MetadataBuilt);
        assert_eq!(rebuilt.meta().unwrap().finalize().unwrap(), text);
        assert_eq!(rebuilt.metadata_digest().unwrap(), built.metadata_digest().unwrap());
    }

    #[test]
    fn verify_needs_a_bound_address() {
        let (information, references) = sample();
        let identity = Identity::<MemoryLedger>::new()
            .attach_information(&information, &references)
            .unwrap();
        assert!(matches!(
            identity.verify("0x01", None),
            Err(IdentityError::PreconditionFailed(_))
        ));
    }
}
