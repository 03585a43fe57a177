use ethers::core::rand::thread_rng;
use ethers::prelude::*;
use ethers::utils::hex;
use std::fmt;
use std::str::FromStr;

/// A signing key together with the address it controls.
#[derive(Clone)]
pub struct AccountIdentity {
    wallet: LocalWallet,
}

impl AccountIdentity {
    pub fn new(wallet: LocalWallet) -> Self {
        Self { wallet }
    }

    /// A fresh identity, used when the relay auth key is not provided.
    pub fn random() -> Self {
        Self::new(LocalWallet::new(&mut thread_rng()))
    }

    pub fn address(&self) -> Address {
        self.wallet.address()
    }

    pub fn wallet(&self) -> &LocalWallet {
        &self.wallet
    }

    /// `0x`-prefixed private key, for the one case where it has to be shown to the operator.
    pub fn private_key_hex(&self) -> String {
        format!("0x{}", hex::encode(self.wallet.signer().to_bytes()))
    }
}

impl FromStr for AccountIdentity {
    type Err = WalletError;

    /// Parses a hex private key, with or without the `0x` prefix.
    fn from_str(key: &str) -> Result<Self, Self::Err> {
        key.trim().parse::<LocalWallet>().map(Self::new)
    }
}

impl From<LocalWallet> for AccountIdentity {
    fn from(wallet: LocalWallet) -> Self {
        Self::new(wallet)
    }
}

impl PartialEq for AccountIdentity {
    fn eq(&self, other: &Self) -> bool {
        self.address() == other.address()
    }
}

impl Eq for AccountIdentity {}

// Never print the key.
impl fmt::Debug for AccountIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AccountIdentity")
            .field(&self.address())
            .finish()
    }
}
