//! Paid collects with treasury and referral cuts.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use pubgraph_access::BPS_MAX;
use pubgraph_core::{from_cbor, to_cbor, Address, HubError};

use super::{decode_init, follows_or_is};
use crate::context::ModuleContext;
use crate::error::ModuleResult;
use crate::traits::{CollectModule, InitParams, ProcessCollectParams};

/// Per-publication config of [`SimpleFeeCollectModule`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimpleFeeCollectConfig {
    /// Price per collect. Zero makes the module free.
    pub amount: u128,
    pub currency: Address,
    pub recipient: Address,
    /// Share of the post-treasury amount paid to a referrer, in bps.
    pub referral_fee: u16,
    pub followers_only: bool,
    /// Maximum number of collects; 0 means unlimited.
    pub collect_limit: u64,
    /// Last collectable instant (Unix ms); 0 means no end.
    pub end_timestamp: i64,
}

/// Collect data a payer must supply: the price they expect to pay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeCollectData {
    pub currency: Address,
    pub amount: u128,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct FeeCollectState {
    config: SimpleFeeCollectConfig,
    current_collects: u64,
}

/// How one payment is divided.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeeSplit {
    pub treasury: u128,
    pub referral: u128,
    pub recipient: u128,
}

/// `value * bps / 10000`, rounded down, without intermediate overflow.
fn bps_of(value: u128, bps: u16) -> u128 {
    let bps = u128::from(bps);
    let denom = u128::from(BPS_MAX);
    (value / denom) * bps + (value % denom) * bps / denom
}

/// Divide `amount` between treasury, referrer and recipient.
///
/// The treasury takes its cut first; the referral cut is taken from what
/// remains; the recipient gets the rest.
pub fn split_fee(amount: u128, treasury_fee: u16, referral_fee: u16, has_referrer: bool) -> FeeSplit {
    let treasury = bps_of(amount, treasury_fee.min(BPS_MAX));
    let after_treasury = amount - treasury;
    let referral = if has_referrer {
        bps_of(after_treasury, referral_fee.min(BPS_MAX))
    } else {
        0
    };
    FeeSplit {
        treasury,
        referral,
        recipient: after_treasury - referral,
    }
}

#[derive(Debug, Default)]
pub struct SimpleFeeCollectModule;

impl CollectModule for SimpleFeeCollectModule {
    fn name(&self) -> &str {
        "simple-fee-collect"
    }

    fn initialize_publication_collect_module(
        &self,
        ctx: &mut ModuleContext<'_>,
        params: &InitParams<'_>,
    ) -> ModuleResult<Bytes> {
        let config: SimpleFeeCollectConfig = decode_init(params.data)?;

        let expired = config.end_timestamp != 0 && config.end_timestamp < ctx.timestamp();
        let bad_currency = if config.amount == 0 {
            !config.currency.is_zero()
        } else {
            !ctx.graph().is_currency_whitelisted(config.currency)
        };
        if expired || bad_currency || config.referral_fee > BPS_MAX {
            return Err(HubError::InitParamsInvalid.into());
        }

        let state = FeeCollectState {
            config,
            current_collects: 0,
        };
        ctx.save(&params.publication, &state)?;
        let encoded = to_cbor(&config).map_err(|_| HubError::InitParamsInvalid)?;
        Ok(Bytes::from(encoded))
    }

    fn process_collect(
        &self,
        ctx: &mut ModuleContext<'_>,
        params: &ProcessCollectParams<'_>,
    ) -> ModuleResult<Bytes> {
        let key = params.publication;
        let mut state: FeeCollectState = ctx.load(&key)?.ok_or(HubError::CollectNotAllowed)?;
        let config = state.config;

        if config.collect_limit != 0 && state.current_collects >= config.collect_limit {
            return Err(HubError::MintLimitExceeded.into());
        }
        if config.end_timestamp != 0 && ctx.timestamp() > config.end_timestamp {
            return Err(HubError::CollectExpired.into());
        }
        if config.followers_only
            && !follows_or_is(
                ctx.graph(),
                params.collector_profile_id,
                params.publication.profile_id,
            )
        {
            return Err(HubError::NotFollowing.into());
        }

        if config.amount > 0 {
            let expected: FeeCollectData =
                from_cbor(params.data).map_err(|_| HubError::ModuleDataMismatch)?;
            if expected.currency != config.currency || expected.amount != config.amount {
                return Err(HubError::ModuleDataMismatch.into());
            }
        }

        state.current_collects += 1;
        ctx.save(&key, &state)?;

        if config.amount == 0 {
            return Ok(Bytes::new());
        }

        let treasury = ctx.graph().treasury();
        let treasury_fee = if treasury.treasury.is_zero() {
            0
        } else {
            treasury.fee_bps
        };

        let referrer = params.referrer.profile_id;
        let referrer_owner = if !referrer.is_zero() && referrer != params.publication.profile_id {
            ctx.graph().owner_of(referrer)
        } else {
            None
        };

        let split = split_fee(
            config.amount,
            treasury_fee,
            config.referral_fee,
            referrer_owner.is_some(),
        );
        let payer = params.executor;

        ctx.transfer(config.currency, payer, treasury.treasury, split.treasury)?;
        if let Some(owner) = referrer_owner {
            ctx.transfer(config.currency, payer, owner, split.referral)?;
        }
        ctx.transfer(config.currency, payer, config.recipient, split.recipient)?;

        Ok(Bytes::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ModuleEnv;
    use crate::error::ModuleRevert;
    use crate::mock::{MockEnv, MockGraph};
    use pubgraph_access::TreasuryData;
    use pubgraph_core::{ProfileId, PublicationKey, PublicationType};
    use proptest::prelude::*;

    const MODULE: Address = Address([0x02; 20]);

    fn currency() -> Address {
        Address::derive(b"usdc")
    }

    fn payer() -> Address {
        Address::derive(b"payer")
    }

    fn recipient() -> Address {
        Address::derive(b"recipient")
    }

    fn treasury() -> Address {
        Address::derive(b"treasury")
    }

    fn referrer_owner() -> Address {
        Address::derive(b"referrer")
    }

    fn graph() -> MockGraph {
        let mut g = MockGraph::default();
        g.currencies.insert(currency());
        g.treasury = TreasuryData {
            treasury: treasury(),
            fee_bps: 500,
        };
        g.owners.insert(ProfileId(1), recipient());
        g.owners.insert(ProfileId(2), payer());
        g.owners.insert(ProfileId(3), referrer_owner());
        g
    }

    fn config() -> SimpleFeeCollectConfig {
        SimpleFeeCollectConfig {
            amount: 10_000,
            currency: currency(),
            recipient: recipient(),
            referral_fee: 1_000,
            followers_only: false,
            collect_limit: 2,
            end_timestamp: 5_000,
        }
    }

    fn init(ctx: &mut ModuleContext<'_>, config: SimpleFeeCollectConfig) -> ModuleResult<Bytes> {
        let data = to_cbor(&config).unwrap();
        SimpleFeeCollectModule.initialize_publication_collect_module(
            ctx,
            &InitParams {
                publication: PublicationKey::from((1, 1)),
                executor: recipient(),
                data: &data,
            },
        )
    }

    fn collect(ctx: &mut ModuleContext<'_>, referrer: PublicationKey, data: &[u8]) -> ModuleResult<Bytes> {
        SimpleFeeCollectModule.process_collect(
            ctx,
            &ProcessCollectParams {
                publication: PublicationKey::from((1, 1)),
                collector_profile_id: ProfileId(2),
                collector_profile_owner: payer(),
                executor: payer(),
                referrer,
                referrer_pub_type: PublicationType::Comment,
                data,
            },
        )
    }

    fn price() -> Vec<u8> {
        to_cbor(&FeeCollectData {
            currency: currency(),
            amount: 10_000,
        })
        .unwrap()
    }

    #[test]
    fn test_split_with_referrer() {
        let s = split_fee(10_000, 500, 1_000, true);
        assert_eq!(s, FeeSplit { treasury: 500, referral: 950, recipient: 8_550 });
    }

    #[test]
    fn test_split_without_referrer() {
        let s = split_fee(10_000, 500, 1_000, false);
        assert_eq!(s, FeeSplit { treasury: 500, referral: 0, recipient: 9_500 });
    }

    #[test]
    fn test_paid_collect_moves_funds() {
        let graph = graph();
        let mut env = MockEnv::default();
        env.balances.insert((currency(), payer()), 20_000);
        let mut ctx = ModuleContext::new(MODULE, &graph, &mut env, 1_000);
        init(&mut ctx, config()).unwrap();
        collect(&mut ctx, PublicationKey::from((3, 1)), &price()).unwrap();
        drop(ctx);

        assert_eq!(env.balance_of(currency(), payer()), 10_000);
        assert_eq!(env.balance_of(currency(), treasury()), 500);
        assert_eq!(env.balance_of(currency(), referrer_owner()), 950);
        assert_eq!(env.balance_of(currency(), recipient()), 8_550);
    }

    #[test]
    fn test_author_as_referrer_gets_no_cut() {
        let graph = graph();
        let mut env = MockEnv::default();
        env.balances.insert((currency(), payer()), 10_000);
        let mut ctx = ModuleContext::new(MODULE, &graph, &mut env, 1_000);
        init(&mut ctx, config()).unwrap();
        collect(&mut ctx, PublicationKey::from((1, 0)), &price()).unwrap();
        drop(ctx);

        assert_eq!(env.balance_of(currency(), recipient()), 9_500);
    }

    #[test]
    fn test_limit_expiry_and_mismatch() {
        let graph = graph();
        let mut env = MockEnv::default();
        env.balances.insert((currency(), payer()), 100_000);
        {
            let mut ctx = ModuleContext::new(MODULE, &graph, &mut env, 1_000);
            init(&mut ctx, config()).unwrap();

            let wrong = to_cbor(&FeeCollectData {
                currency: currency(),
                amount: 1,
            })
            .unwrap();
            assert_eq!(
                collect(&mut ctx, PublicationKey::ZERO, &wrong),
                Err(ModuleRevert::Reason(HubError::ModuleDataMismatch))
            );

            collect(&mut ctx, PublicationKey::ZERO, &price()).unwrap();
            collect(&mut ctx, PublicationKey::ZERO, &price()).unwrap();
            assert_eq!(
                collect(&mut ctx, PublicationKey::ZERO, &price()),
                Err(ModuleRevert::Reason(HubError::MintLimitExceeded))
            );
        }

        let mut late = ModuleContext::new(MODULE, &graph, &mut env, 9_000);
        let mut unlimited = config();
        unlimited.collect_limit = 0;
        unlimited.end_timestamp = 0;
        // Re-init under the late clock with no end, then check an ended config.
        init(&mut late, unlimited).unwrap();
        assert!(collect(&mut late, PublicationKey::ZERO, &price()).is_ok());
        drop(late);

        let mut early = ModuleContext::new(MODULE, &graph, &mut env, 1_000);
        let mut ending = config();
        ending.collect_limit = 0;
        init(&mut early, ending).unwrap();
        drop(early);
        let mut after = ModuleContext::new(MODULE, &graph, &mut env, 5_001);
        assert_eq!(
            collect(&mut after, PublicationKey::ZERO, &price()),
            Err(ModuleRevert::Reason(HubError::CollectExpired))
        );
    }

    #[test]
    fn test_insufficient_balance() {
        let graph = graph();
        let mut env = MockEnv::default();
        let mut ctx = ModuleContext::new(MODULE, &graph, &mut env, 1_000);
        init(&mut ctx, config()).unwrap();
        assert!(matches!(
            collect(&mut ctx, PublicationKey::ZERO, &price()),
            Err(ModuleRevert::Reason(HubError::InsufficientBalance { .. }))
        ));
    }

    #[test]
    fn test_init_validation() {
        let graph = graph();
        let mut env = MockEnv::default();
        let mut ctx = ModuleContext::new(MODULE, &graph, &mut env, 1_000);

        let mut bad_currency = config();
        bad_currency.currency = Address::derive(b"unknown");
        let mut bad_referral = config();
        bad_referral.referral_fee = 10_001;
        let mut expired = config();
        expired.end_timestamp = 999;

        for cfg in [bad_currency, bad_referral, expired] {
            assert_eq!(
                init(&mut ctx, cfg),
                Err(ModuleRevert::Reason(HubError::InitParamsInvalid))
            );
        }
    }

    proptest! {
        #[test]
        fn prop_split_conserves_amount(
            amount in any::<u128>(),
            treasury_fee in 0u16..=10_000,
            referral_fee in 0u16..=10_000,
            has_referrer in any::<bool>(),
        ) {
            let s = split_fee(amount, treasury_fee, referral_fee, has_referrer);
            prop_assert_eq!(s.treasury + s.referral + s.recipient, amount);
            prop_assert!(s.treasury <= amount);
            if !has_referrer {
                prop_assert_eq!(s.referral, 0);
            }
        }
    }
}
