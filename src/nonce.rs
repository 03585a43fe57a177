use crate::error::AssemblyError;
use crate::helpers::provider::ChainClient;
use crate::Result;
use ethers::types::{Address, U256};
use futures::future::try_join_all;
use std::collections::HashMap;
use tracing::*;

/// Next nonce of every signer in a bundle, advanced as bundle entries claim them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NonceTracker {
    next: HashMap<Address, U256>,
}

impl NonceTracker {
    pub fn new(next: HashMap<Address, U256>) -> Self {
        Self { next }
    }

    /// Fetches the pending nonce of every address, concurrently, one request each.
    #[instrument(skip_all, fields(signers = addresses.len()))]
    pub async fn load<C: ChainClient>(chain: &C, addresses: &[Address]) -> Result<Self> {
        let nonces = try_join_all(
            addresses
                .iter()
                .map(|address| chain.pending_nonce(*address)),
        )
        .await?;

        let next = addresses.iter().copied().zip(nonces).collect();
        debug!(?next, "pending nonces");

        Ok(Self { next })
    }

    /// Claims the nonce for the next transaction of `address`.
    ///
    /// An explicit nonce is accepted as long as it does not go backwards; the one after it
    /// becomes the next nonce of `address`.
    ///
    /// # Errors
    ///
    /// * [`AssemblyError::NonceOrder`] if `explicit` is below the next nonce of `address`.
    pub fn assign(
        &mut self,
        address: Address,
        explicit: Option<U256>,
    ) -> std::result::Result<U256, AssemblyError> {
        let expected = self.next.get(&address).copied().unwrap_or_default();

        let nonce = match explicit {
            Some(nonce) if nonce < expected => {
                return Err(AssemblyError::NonceOrder {
                    address,
                    nonce,
                    expected,
                })
            }
            Some(nonce) => nonce,
            None => expected,
        };

        self.next.insert(address, nonce + 1);
        Ok(nonce)
    }

    /// Nonce the next transaction of `address` would get.
    pub fn peek(&self, address: Address) -> Option<U256> {
        self.next.get(&address).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;

    #[tokio::test]
    async fn loads_every_signer() {
        let chain = MockChain::default()
            .with_pending_nonce(EXECUTOR, 4)
            .with_pending_nonce(SNIPER, 0);

        let tracker = NonceTracker::load(&chain, &[EXECUTOR, SNIPER]).await.unwrap();

        assert_eq!(tracker.peek(EXECUTOR), Some(U256::from(4)));
        assert_eq!(tracker.peek(SNIPER), Some(U256::zero()));
        assert_eq!(tracker.peek(SPONSOR), None);
    }

    #[test]
    fn consecutive_nonces_per_signer() {
        let mut tracker = NonceTracker::new(HashMap::from([
            (EXECUTOR, U256::from(10)),
            (SNIPER, U256::from(3)),
        ]));

        let assigned: Vec<_> = [EXECUTOR, SNIPER, EXECUTOR, EXECUTOR, SNIPER]
            .into_iter()
            .map(|address| tracker.assign(address, None).unwrap().as_u64())
            .collect();

        assert_eq!(assigned, vec![10, 3, 11, 12, 4]);
    }

    #[test]
    fn explicit_nonces_may_skip_ahead_but_not_back() {
        let mut tracker = NonceTracker::new(HashMap::from([(EXECUTOR, U256::from(5))]));

        assert_eq!(tracker.assign(EXECUTOR, Some(U256::from(8))), Ok(U256::from(8)));
        assert_eq!(tracker.assign(EXECUTOR, None), Ok(U256::from(9)));
        assert_eq!(
            tracker.assign(EXECUTOR, Some(U256::from(9))),
            Err(AssemblyError::NonceOrder {
                address: EXECUTOR,
                nonce: U256::from(9),
                expected: U256::from(10),
            })
        );
    }
}
