use ethers::types::Chain;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayNetwork {
    pub chain_id: u64,
    pub api_url: String,
}

const MAINNET_RELAY: &str = "https://relay.flashbots.net";
const SEPOLIA_RELAY: &str = "https://relay-sepolia.flashbots.net";
const GOERLI_RELAY: &str = "https://relay-goerli.flashbots.net";

/// Relay the bundles are submitted to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Network {
    Mainnet,
    Sepolia,
    Goerli,
    Custom { chain_id: u64, url: String },
}

impl Network {
    /// Public relay for `chain_id`, if there is one.
    pub fn from_chain_id(chain_id: u64) -> Option<Self> {
        match Chain::try_from(chain_id).ok()? {
            Chain::Mainnet => Some(Self::Mainnet),
            Chain::Sepolia => Some(Self::Sepolia),
            Chain::Goerli => Some(Self::Goerli),
            _ => None,
        }
    }
}

impl From<Network> for RelayNetwork {
    fn from(value: Network) -> Self {
        let (chain, url) = match value {
            Network::Mainnet => (Chain::Mainnet as u64, MAINNET_RELAY.to_string()),
            Network::Sepolia => (Chain::Sepolia as u64, SEPOLIA_RELAY.to_string()),
            Network::Goerli => (Chain::Goerli as u64, GOERLI_RELAY.to_string()),
            Network::Custom { chain_id, url } => (chain_id, url),
        };

        Self {
            chain_id: chain,
            api_url: url,
        }
    }
}
