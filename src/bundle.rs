use crate::account::AccountIdentity;
use crate::error::AssemblyError;
use crate::wrapper::CallRequest;
use crate::Result;
use derive_new::new;
use ethers::prelude::*;
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::utils::keccak256;
use std::fmt::Display;

/// One bundle transaction and the account that signs it.
#[derive(new, Debug, Clone, PartialEq, Eq)]
pub struct BundleEntry {
    pub signer: AccountIdentity,
    pub call: CallRequest,
}

/// Append-only list of bundle entries, in execution order.
#[derive(Debug, Default, Clone)]
pub struct BundleAssembler {
    entries: Vec<BundleEntry>,
}

impl BundleAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one entry.
    ///
    /// # Errors
    ///
    /// * [`AssemblyError::InvalidEntry`] if the call names a sender other than `signer`.
    pub fn add_entry(
        &mut self,
        signer: AccountIdentity,
        call: CallRequest,
    ) -> std::result::Result<&mut Self, AssemblyError> {
        let entry = BundleEntry::new(signer, call);
        check_entry(&entry)?;
        self.entries.push(entry);
        Ok(self)
    }

    /// Appends `entries` in order. Nothing is appended unless every entry is valid.
    pub fn add_entries(
        &mut self,
        entries: impl IntoIterator<Item = BundleEntry>,
    ) -> std::result::Result<&mut Self, AssemblyError> {
        let entries = entries.into_iter().collect::<Vec<_>>();
        entries.iter().try_for_each(check_entry)?;
        self.entries.extend(entries);
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshot of the entries appended so far.
    ///
    /// # Errors
    ///
    /// * [`AssemblyError::EmptyBundle`] if nothing was appended.
    pub fn finalize(&self) -> std::result::Result<Bundle, AssemblyError> {
        if self.entries.is_empty() {
            return Err(AssemblyError::EmptyBundle);
        }

        Ok(Bundle {
            entries: self.entries.clone(),
        })
    }
}

fn check_entry(entry: &BundleEntry) -> std::result::Result<(), AssemblyError> {
    match entry.call.from {
        Some(from) if from != entry.signer.address() => Err(AssemblyError::InvalidEntry {
            signer: entry.signer.address(),
            from,
        }),
        _ => Ok(()),
    }
}

/// A finalized, non-empty bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bundle {
    entries: Vec<BundleEntry>,
}

impl Bundle {
    pub fn entries(&self) -> &[BundleEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Distinct signer addresses, in order of first appearance.
    pub fn signers(&self) -> Vec<Address> {
        let mut signers = Vec::new();
        for entry in &self.entries {
            let address = entry.signer.address();
            if !signers.contains(&address) {
                signers.push(address);
            }
        }
        signers
    }
}

/// A signed bundle transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTx {
    pub raw: Bytes,
    pub hash: TxHash,
    pub signer: Address,
    pub nonce: U256,
}

/// Signed transactions of a bundle, ready for the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedBundle {
    pub txs: Vec<SignedTx>,
}

impl Display for SignedBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[")?;
        for (i, tx) in self.txs.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{:?}", tx.hash)?;
        }
        write!(f, "]")
    }
}

impl SignedBundle {
    /// Signs every transaction with its own signer, keeping the order.
    ///
    /// Every transaction needs its nonce set beforehand.
    pub fn sign(
        transactions: impl IntoIterator<Item = (AccountIdentity, TypedTransaction)>,
    ) -> Result<Self> {
        let txs = transactions
            .into_iter()
            .map(|(signer, tx)| {
                let signature = signer.wallet().sign_transaction_sync(&tx)?;
                let raw = tx.rlp_signed(&signature);

                Ok(SignedTx {
                    hash: keccak256(&raw).into(),
                    raw,
                    signer: signer.address(),
                    nonce: tx.nonce().copied().unwrap_or_default(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { txs })
    }

    pub fn raw_txs(&self) -> Vec<Bytes> {
        self.txs.iter().map(|tx| tx.raw.clone()).collect()
    }

    pub fn hashes(&self) -> impl Iterator<Item = TxHash> + '_ {
        self.txs.iter().map(|tx| tx.hash)
    }

    /// First transaction of every signer, i.e. the one carrying its lowest nonce.
    pub fn first_per_signer(&self) -> Vec<&SignedTx> {
        let mut firsts: Vec<&SignedTx> = Vec::new();
        for tx in &self.txs {
            if !firsts.iter().any(|first| first.signer == tx.signer) {
                firsts.push(tx);
            }
        }
        firsts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fees::{gwei, Fees};
    use crate::test_utils::*;
    use crate::wrapper::TxWrapper;

    fn transfer(value: u64) -> CallRequest {
        CallRequest::transfer(SNIPER, U256::from(value))
    }

    #[test]
    fn finalize_keeps_insertion_order() {
        let mut assembler = BundleAssembler::new();
        assembler
            .add_entries([
                BundleEntry::new(executor(), transfer(1)),
                BundleEntry::new(sponsor(), transfer(2)),
            ])
            .unwrap()
            .add_entry(executor(), transfer(3))
            .unwrap();

        let bundle = assembler.finalize().unwrap();
        let values: Vec<_> = bundle
            .entries()
            .iter()
            .map(|entry| entry.call.value.unwrap().as_u64())
            .collect();

        assert_eq!(values, vec![1, 2, 3]);
        assert_eq!(bundle.signers(), vec![EXECUTOR, SPONSOR]);
    }

    #[test]
    fn empty_bundles_cannot_be_finalized() {
        assert_eq!(
            BundleAssembler::new().finalize(),
            Err(AssemblyError::EmptyBundle)
        );
    }

    #[test]
    fn entries_must_be_sent_by_their_signer() {
        let mut assembler = BundleAssembler::new();
        let mismatched = CallRequest {
            from: Some(SPONSOR),
            ..transfer(1)
        };

        assert_eq!(
            assembler.add_entry(executor(), mismatched.clone()).err(),
            Some(AssemblyError::InvalidEntry {
                signer: EXECUTOR,
                from: SPONSOR
            })
        );
        assert!(assembler
            .add_entries([
                BundleEntry::new(executor(), transfer(1)),
                BundleEntry::new(executor(), mismatched),
            ])
            .is_err());
        assert!(assembler.is_empty());

        let matching = CallRequest {
            from: Some(EXECUTOR),
            ..transfer(1)
        };
        assert!(assembler.add_entry(executor(), matching).is_ok());
    }

    #[test]
    fn signs_with_each_entry_signer() {
        let wrapper = TxWrapper::new(1, Fees::Legacy { gas_price: gwei(40) });
        let entries = [(executor(), 0_u64), (sniper(), 7), (executor(), 1)];

        let signed = SignedBundle::sign(entries.iter().map(|(signer, nonce)| {
            let call = transfer(1).with_nonce(U256::from(*nonce));
            (signer.clone(), wrapper.wrap(signer.address(), &call).unwrap())
        }))
        .unwrap();

        assert_eq!(signed.txs.len(), 3);
        for (tx, (signer, nonce)) in signed.txs.iter().zip(entries.iter()) {
            let decoded: Transaction = ethers::utils::rlp::decode(&tx.raw).unwrap();
            assert_eq!(decoded.recover_from().unwrap(), signer.address());
            assert_eq!(decoded.hash, tx.hash);
            assert_eq!(tx.nonce, U256::from(*nonce));
        }

        let firsts: Vec<_> = signed
            .first_per_signer()
            .iter()
            .map(|tx| (tx.signer, tx.nonce.as_u64()))
            .collect();
        assert_eq!(firsts, vec![(EXECUTOR, 0), (SNIPER, 7)]);
    }
}
