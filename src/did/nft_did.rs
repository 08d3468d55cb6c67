// src/did/nft_did.rs
//! Identifiers of identity tokens: `did:nft:eip155:<chainId>_erc721:<contract>_<tokenId>`.

use std::fmt;
use std::str::FromStr;

use ethers_core::types::{Address, U256};
use ethers_core::utils::to_checksum;

use crate::error::IdentityError;

const DID_SCHEME: &str = "did";
const DID_METHOD: &str = "nft";
const CHAIN_NAMESPACE: &str = "eip155";
const ASSET_NAMESPACE: &str = "erc721";

/// The DID of an ERC-721 identity token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NftDid {
    pub chain_id: u64,
    pub contract: Address,
    pub token_id: U256,
}

impl NftDid {
    pub fn new(chain_id: u64, contract: Address, token_id: U256) -> Self {
        Self {
            chain_id,
            contract,
            token_id,
        }
    }
}

impl fmt::Display for NftDid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}_{}:{}_{}",
            DID_SCHEME,
            DID_METHOD,
            CHAIN_NAMESPACE,
            self.chain_id,
            ASSET_NAMESPACE,
            to_checksum(&self.contract, None),
            self.token_id
        )
    }
}

impl FromStr for NftDid {
    type Err = IdentityError;

    fn from_str(did: &str) -> Result<Self, Self::Err> {
        let malformed = |reason: &str| IdentityError::MalformedIdentifier(format!("{}: {}", reason, did));

        let segments: Vec<&str> = did.split(':').collect();
        let [scheme, method, namespace, chain, asset] = segments.as_slice() else {
            return Err(malformed("expected 5 ':'-separated segments"));
        };
        if *scheme != DID_SCHEME || *method != DID_METHOD || *namespace != CHAIN_NAMESPACE {
            return Err(malformed("expected a did:nft:eip155 prefix"));
        }

        let (chain_id, asset_namespace) = chain
            .split_once('_')
            .ok_or_else(|| malformed("missing '_erc721' after the chain id"))?;
        if asset_namespace != ASSET_NAMESPACE {
            return Err(malformed("expected an erc721 asset namespace"));
        }
        let chain_id = chain_id
            .parse::<u64>()
            .map_err(|_| malformed("chain id is not a number"))?;

        let (contract, token_id) = asset
            .split_once('_')
            .ok_or_else(|| malformed("missing '_<tokenId>' after the contract"))?;
        let hex = contract
            .strip_prefix("0x")
            .ok_or_else(|| malformed("contract address must be 0x-prefixed"))?;
        if hex.len() != 40 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(malformed("contract address must have 40 hex digits"));
        }
        let contract = contract
            .parse::<Address>()
            .map_err(|_| malformed("invalid contract address"))?;
        if token_id.is_empty() || !token_id.chars().all(|c| c.is_ascii_digit()) {
            return Err(malformed("token id is not a decimal number"));
        }
        let token_id = U256::from_dec_str(token_id).map_err(|_| malformed("token id out of range"))?;

        Ok(NftDid {
            chain_id,
            contract,
            token_id,
        })
    }
}
