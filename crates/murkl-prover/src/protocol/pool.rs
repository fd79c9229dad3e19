//! Pools and deposit records

use super::error::ProtocolError;
use crate::accumulator::Accumulator;
use crate::hash::Hash32;
use crate::types::Address;

/// Upper bound on `max_relayer_fee_bps` (1%)
pub const MAX_RELAYER_FEE_BPS: u16 = 100;

/// Basis-point denominator
pub const BPS_DENOMINATOR: u128 = 10_000;

/// Per-pool configuration fixed at initialisation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PoolConfig {
    pub min_deposit: u64,
    pub max_relayer_fee_bps: u16,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min_deposit: 1,
            max_relayer_fee_bps: MAX_RELAYER_FEE_BPS,
        }
    }
}

impl PoolConfig {
    pub fn validate(&self) -> Result<(), ProtocolError> {
        if self.max_relayer_fee_bps > MAX_RELAYER_FEE_BPS {
            return Err(ProtocolError::InvalidConfig(format!(
                "max_relayer_fee_bps {} exceeds {}",
                self.max_relayer_fee_bps, MAX_RELAYER_FEE_BPS
            )));
        }
        if self.min_deposit == 0 {
            return Err(ProtocolError::InvalidConfig("min_deposit must be positive".into()));
        }
        Ok(())
    }

    /// Largest relayer fee allowed on a deposit of `amount`
    pub fn max_relayer_fee(&self, amount: u64) -> u64 {
        (amount as u128 * self.max_relayer_fee_bps as u128 / BPS_DENOMINATOR) as u64
    }
}

/// A shared deposit pool for one (admin, mint) pair
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pool {
    pub admin: Address,
    pub mint: Address,
    pub vault: Address,
    pub config: PoolConfig,
    pub paused: bool,
    pub tree: Accumulator,
}

/// One deposit, keyed by (pool, leaf_index)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DepositRecord {
    pub pool: Address,
    pub leaf_index: u64,
    pub amount: u64,
    pub commitment: Hash32,
    pub claimed: bool,
}

impl Pool {
    pub fn new(
        admin: Address,
        mint: Address,
        vault: Address,
        config: PoolConfig,
    ) -> Result<Self, ProtocolError> {
        config.validate()?;
        Ok(Self {
            admin,
            mint,
            vault,
            config,
            paused: false,
            tree: Accumulator::new(),
        })
    }

    pub fn merkle_root(&self) -> Hash32 {
        self.tree.root
    }

    pub fn leaf_count(&self) -> u64 {
        self.tree.leaf_count
    }

    /// Append a commitment; returns the record to persist.
    ///
    /// The token transfer into the vault is the caller's half of the same
    /// atomic step.
    pub fn deposit(
        &mut self,
        pool_key: Address,
        amount: u64,
        commitment: Hash32,
    ) -> Result<DepositRecord, ProtocolError> {
        if self.paused {
            return Err(ProtocolError::PoolPaused);
        }
        if amount < self.config.min_deposit {
            return Err(ProtocolError::DepositTooSmall {
                amount,
                min: self.config.min_deposit,
            });
        }
        let leaf_index = self.tree.append(commitment)?;
        Ok(DepositRecord {
            pool: pool_key,
            leaf_index,
            amount,
            commitment,
            claimed: false,
        })
    }

    pub fn set_paused(&mut self, caller: &Address, paused: bool) -> Result<(), ProtocolError> {
        if *caller != self.admin {
            return Err(ProtocolError::Unauthorized);
        }
        self.paused = paused;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool() -> Pool {
        Pool::new(
            [1; 32],
            [2; 32],
            [3; 32],
            PoolConfig {
                min_deposit: 1_000,
                max_relayer_fee_bps: 50,
            },
        )
        .unwrap()
    }

    #[test]
    fn test_deposit_advances_tree() {
        let mut p = pool();
        let before = p.merkle_root();
        let rec = p.deposit([9; 32], 10_000_000, [7; 32]).unwrap();
        assert_eq!(rec.leaf_index, 0);
        assert_eq!(p.leaf_count(), 1);
        assert_ne!(p.merkle_root(), before);
        assert!(!rec.claimed);
    }

    #[test]
    fn test_deposit_rejections_leave_pool_untouched() {
        let mut p = pool();
        let snapshot = p.clone();
        assert_eq!(
            p.deposit([9; 32], 999, [7; 32]),
            Err(ProtocolError::DepositTooSmall { amount: 999, min: 1_000 })
        );
        p.paused = true;
        assert_eq!(p.deposit([9; 32], 5_000, [7; 32]), Err(ProtocolError::PoolPaused));
        p.paused = false;
        assert_eq!(p, snapshot);
    }

    #[test]
    fn test_config_bounds() {
        let bad = PoolConfig {
            min_deposit: 1,
            max_relayer_fee_bps: 101,
        };
        assert!(matches!(bad.validate(), Err(ProtocolError::InvalidConfig(_))));
        assert_eq!(PoolConfig::default().max_relayer_fee(1_000_000), 10_000);
    }

    #[test]
    fn test_only_admin_pauses() {
        let mut p = pool();
        assert_eq!(p.set_paused(&[5; 32], true), Err(ProtocolError::Unauthorized));
        p.set_paused(&[1; 32], true).unwrap();
        assert!(p.paused);
    }
}
