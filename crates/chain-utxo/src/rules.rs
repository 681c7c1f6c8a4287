use crate::address;
use crate::error::UtxoError;
use crate::params::{Chain, ChainParams, Network, SizeModel};

/// The chain-specific strategy the selector and assembler are generic over.
///
/// Implementors supply parameters and address handling; the provided
/// methods derive everything else from them. Override `address_to_script`
/// to plug in an encoding the built-in formats do not cover.
pub trait ChainRules {
    fn params(&self) -> &ChainParams;

    /// Resolve an address to the scriptPubKey it pays.
    fn address_to_script(&self, address: &str) -> Result<Vec<u8>, UtxoError>;

    fn validate_address(&self, address: &str) -> Result<(), UtxoError> {
        self.address_to_script(address).map(|_| ())
    }

    fn dust_threshold(&self) -> u64 {
        self.params().dust_threshold
    }

    fn size_model(&self) -> SizeModel {
        self.params().size
    }

    fn decimals(&self) -> u8 {
        self.params().decimals
    }

    fn max_memo_bytes(&self) -> usize {
        self.params().max_memo_bytes
    }
}

/// Rules driven entirely by a [`ChainParams`] table entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StandardChain {
    params: ChainParams,
}

impl StandardChain {
    pub fn new(params: ChainParams) -> Result<Self, UtxoError> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn for_chain(chain: Chain, network: Network) -> Self {
        Self {
            params: ChainParams::for_chain(chain, network),
        }
    }
}

impl ChainRules for StandardChain {
    fn params(&self) -> &ChainParams {
        &self.params
    }

    fn address_to_script(&self, addr: &str) -> Result<Vec<u8>, UtxoError> {
        address::address_to_script(addr, &self.params.address_formats)
    }
}
