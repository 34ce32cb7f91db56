//! Sponsored `setGreeting` calls paid through the paymaster
//!
//! Both demo wallets hold no native currency. Each one sends a single
//! greeting update whose fee the paymaster covers, charging the caller in
//! tokens unless it holds a VIP NFT.

use crate::chain::PaymasterNetwork;
use crate::config::{ContractAddresses, Settings};
use crate::contracts::SetGreetingCall;
use crate::error::{PaymasterError, PaymasterResult};
use crate::tx::{ExecuteRequest, FeeQuote, GasEstimator, GasSettings, OraclePrices, TransactionSender};
use crate::wallet::WalletRole;

use ethers::abi::AbiEncode;
use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, H256, U256};
use ethers::utils::format_units;
use std::sync::Arc;
use tracing::{debug, info};

/// Outcome of one sponsored greeting update
#[derive(Debug, Clone)]
pub struct SponsoredCall {
    pub role: WalletRole,
    pub address: Address,
    pub quote: FeeQuote,
    pub greeting_before: String,
    pub greeting_after: String,
    pub tx_hash: H256,
}

/// Token balance change of one wallet across the run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceReport {
    pub role: WalletRole,
    pub address: Address,
    pub before: U256,
    pub after: U256,
    pub fee_paid: U256,
}

impl BalanceReport {
    fn new(role: WalletRole, address: Address, before: U256, after: U256) -> PaymasterResult<Self> {
        let fee_paid = before.checked_sub(after).ok_or_else(|| {
            PaymasterError::Internal(format!(
                "Token balance of {} wallet grew from {} to {} during the run",
                role, before, after
            ))
        })?;

        Ok(Self {
            role,
            address,
            before,
            after,
            fee_paid,
        })
    }
}

/// Oracle proxies priced through the paymaster's `readDapi`
#[derive(Debug, Clone, Copy)]
pub struct OracleProxies {
    pub native_usd: Address,
    pub token_usd: Address,
}

pub struct SponsoredFlow<'a, N: PaymasterNetwork + ?Sized> {
    sender: &'a TransactionSender<N>,
    contracts: ContractAddresses,
    oracles: OracleProxies,
    estimator: GasEstimator,
}

impl<'a, N: PaymasterNetwork + ?Sized> SponsoredFlow<'a, N> {
    pub fn new(
        sender: &'a TransactionSender<N>,
        contracts: ContractAddresses,
        oracles: OracleProxies,
        estimation_allowance: U256,
    ) -> Self {
        Self {
            sender,
            contracts,
            oracles,
            estimator: GasEstimator::new(contracts.paymaster, contracts.token, estimation_allowance),
        }
    }

    /// Every wallet must hold exactly zero native currency
    pub async fn preflight(&self, wallets: &[(WalletRole, &LocalWallet)]) -> PaymasterResult<()> {
        for (role, wallet) in wallets {
            let balance = self.sender.network().native_balance(wallet.address()).await?;
            if !balance.is_zero() {
                return Err(PaymasterError::WalletNotEmpty {
                    role: role.to_string(),
                    address: format!("{:?}", wallet.address()),
                    balance: balance.to_string(),
                });
            }
            debug!("{} wallet {:?} holds no native currency", role, wallet.address());
        }
        Ok(())
    }

    pub async fn token_balance(&self, owner: Address) -> PaymasterResult<U256> {
        self.sender
            .network()
            .token_balance(self.contracts.token, owner)
            .await
    }

    async fn oracle_prices(&self) -> PaymasterResult<OraclePrices> {
        let network = self.sender.network();
        let native = network
            .read_dapi(self.contracts.paymaster, self.oracles.native_usd)
            .await?;
        let token = network
            .read_dapi(self.contracts.paymaster, self.oracles.token_usd)
            .await?;

        Ok(OraclePrices { native, token })
    }

    /// Estimate, quote and submit one sponsored `setGreeting(greeting)`
    pub async fn send_greeting(
        &self,
        role: WalletRole,
        wallet: &LocalWallet,
        greeting: &str,
    ) -> PaymasterResult<SponsoredCall> {
        let network = self.sender.network();
        let greeter = self.contracts.greeter;
        let calldata = SetGreetingCall {
            greeting: greeting.to_string(),
        }
        .encode();

        let gas_price = network.gas_price().await?;

        let estimation = ExecuteRequest::new(greeter, calldata.clone())
            .paymaster(self.estimator.estimation_params());
        let gas_limit = self
            .sender
            .estimate_gas(wallet.address(), &estimation)
            .await?;

        let prices = self.oracle_prices().await?;
        let quote = FeeQuote::new(gas_price, gas_limit, prices)?;
        info!(
            "{} wallet: gas limit {}, native fee {}, token fee {} (native/usd {}, token/usd {})",
            role, gas_limit, quote.native_fee, quote.token_fee, prices.native, prices.token
        );

        let greeting_before = network.greeting(greeter).await?;

        let request = ExecuteRequest::new(greeter, calldata)
            .paymaster(self.estimator.final_params(&quote))
            .gas(GasSettings {
                gas_limit,
                max_fee_per_gas: gas_price,
                max_priority_fee_per_gas: U256::zero(),
            });
        let operation = format!("sponsored greeting from {} wallet", role);
        let receipt = self.sender.execute(wallet, request, &operation).await?;

        let greeting_after = network.greeting(greeter).await?;

        Ok(SponsoredCall {
            role,
            address: wallet.address(),
            quote,
            greeting_before,
            greeting_after,
            tx_hash: receipt.transaction_hash,
        })
    }

    /// Pre-flight, one sponsored call per wallet, then the balance deltas
    pub async fn execute(
        &self,
        calls: &[(WalletRole, &LocalWallet, &str)],
    ) -> PaymasterResult<(Vec<SponsoredCall>, Vec<BalanceReport>)> {
        let wallets: Vec<_> = calls.iter().map(|(role, wallet, _)| (*role, *wallet)).collect();
        self.preflight(&wallets).await?;

        let mut before = Vec::with_capacity(calls.len());
        for (role, wallet, _) in calls {
            let balance = self.token_balance(wallet.address()).await?;
            info!("{} wallet token balance before: {}", role, balance);
            before.push(balance);
        }

        let mut outcomes = Vec::with_capacity(calls.len());
        for (role, wallet, greeting) in calls {
            outcomes.push(self.send_greeting(*role, wallet, greeting).await?);
        }

        let mut reports = Vec::with_capacity(calls.len());
        for ((role, wallet, _), before) in calls.iter().zip(before) {
            let after = self.token_balance(wallet.address()).await?;
            reports.push(BalanceReport::new(*role, wallet.address(), before, after)?);
        }

        Ok((outcomes, reports))
    }
}

fn display_amount(amount: U256, decimals: u8) -> String {
    format_units(amount, u32::from(decimals)).unwrap_or_else(|_| amount.to_string())
}

/// Full sponsored-call run against the configured contracts
pub async fn run<N: PaymasterNetwork + ?Sized>(
    network: Arc<N>,
    settings: &Settings,
    nft_holder: &LocalWallet,
    non_holder: &LocalWallet,
) -> PaymasterResult<Vec<BalanceReport>> {
    let contracts = settings.contracts.addresses()?;
    let oracles = OracleProxies {
        native_usd: settings.oracles.native_usd_proxy()?,
        token_usd: settings.oracles.token_usd_proxy()?,
    };
    let sponsorship = &settings.sponsorship;

    let sender = TransactionSender::new(network, sponsorship.gas_per_pubdata);
    let flow = SponsoredFlow::new(
        &sender,
        contracts,
        oracles,
        sponsorship.estimation_allowance()?,
    );

    let calls = [
        (
            WalletRole::NftHolder,
            nft_holder,
            sponsorship.nft_holder_greeting.as_str(),
        ),
        (
            WalletRole::NonHolder,
            non_holder,
            sponsorship.non_holder_greeting.as_str(),
        ),
    ];
    let (outcomes, reports) = flow.execute(&calls).await?;

    let decimals = sender.network().token_decimals(contracts.token).await?;

    for call in &outcomes {
        println!("---- {} wallet {:?} ----", call.role, call.address);
        println!("Estimated native fee: {} wei", call.quote.native_fee);
        println!(
            "Oracle prices: native/usd {}, token/usd {}",
            call.quote.prices.native, call.quote.prices.token
        );
        println!("Estimated token fee: {}", display_amount(call.quote.token_fee, decimals));
        println!("Greeting before: {}", call.greeting_before);
        println!("Greeting after: {}", call.greeting_after);
        println!("Transaction: {:?}", call.tx_hash);
    }

    println!("------------ Result ------------");
    for report in &reports {
        println!(
            "{} wallet token balance: {} -> {}, fee paid {}",
            report.role,
            display_amount(report.before, decimals),
            display_amount(report.after, decimals),
            display_amount(report.fee_paid, decimals)
        );
    }

    Ok(reports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::MockPaymasterNetwork;
    use ethers::abi::{decode, ParamType, Token};
    use ethers::types::{Bytes, TransactionReceipt, U64};
    use ethers::utils::rlp::Rlp;
    use std::sync::Mutex;

    const HOLDER_KEY: &str = "7726827caac94a7f9e1b160f7ea819f172f7b6f9d2a97f992c38edeab82d4110";
    const NON_HOLDER_KEY: &str = "ac1e735be8536c6534bb4f17f06f6afc73b2b5ba84ac2cfb12f7461b20c0bbe3";

    fn contracts() -> ContractAddresses {
        ContractAddresses {
            paymaster: Address::from_low_u64_be(0x10),
            greeter: Address::from_low_u64_be(0x20),
            token: Address::from_low_u64_be(0x30),
            nft: Address::from_low_u64_be(0x40),
        }
    }

    fn oracles() -> OracleProxies {
        OracleProxies {
            native_usd: Address::from_low_u64_be(0xe7),
            token_usd: Address::from_low_u64_be(0xc0),
        }
    }

    fn placeholder() -> U256 {
        U256::from_dec_str("100000000000000000000").unwrap()
    }

    fn wallets() -> (LocalWallet, LocalWallet) {
        (HOLDER_KEY.parse().unwrap(), NON_HOLDER_KEY.parse().unwrap())
    }

    /// Allowance carried in the paymaster input of a raw 0x71 transaction
    fn allowance_of(raw: &[u8]) -> U256 {
        let rlp = Rlp::new(&raw[1..]);
        let input: Vec<u8> = rlp.at(15).unwrap().val_at(1).unwrap();
        let tokens = decode(
            &[ParamType::Address, ParamType::Uint(256), ParamType::Bytes],
            &input[4..],
        )
        .unwrap();
        match &tokens[1] {
            Token::Uint(value) => *value,
            other => panic!("unexpected token {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_non_empty_wallet_aborts_before_sending() {
        let (holder, non_holder) = wallets();
        let holder_address = holder.address();

        let mut network = MockPaymasterNetwork::new();
        network.expect_native_balance().returning(move |owner| {
            if owner == holder_address {
                Ok(U256::from(1))
            } else {
                Ok(U256::zero())
            }
        });
        network.expect_send_raw_transaction().never();
        network.expect_estimate_gas().never();

        let sender = TransactionSender::new(Arc::new(network), 50_000);
        let flow = SponsoredFlow::new(&sender, contracts(), oracles(), placeholder());

        let err = flow
            .execute(&[
                (WalletRole::NftHolder, &holder, "This is a Free Transaction"),
                (WalletRole::NonHolder, &non_holder, "This Greeting Cost USDC"),
            ])
            .await
            .unwrap_err();

        assert!(err.is_precondition());
        match err {
            PaymasterError::WalletNotEmpty { role, balance, .. } => {
                assert_eq!(role, "NFT holder");
                assert_eq!(balance, "1");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_sponsored_calls_and_balance_delta() {
        let (holder, non_holder) = wallets();
        let non_holder_address = non_holder.address();
        let before = U256::from_dec_str("5000000000000000000000").unwrap();
        // 100 wei * 50_000 gas * 2000 / 1
        let token_fee = U256::from(10_000_000_000u64);

        let mut network = MockPaymasterNetwork::new();
        network.expect_chain_id().return_const(280u64);
        network.expect_nonce().returning(|_| Ok(U256::zero()));
        network.expect_native_balance().returning(|_| Ok(U256::zero()));
        network.expect_gas_price().returning(|| Ok(U256::from(100)));
        network
            .expect_estimate_gas()
            .times(2)
            .withf(move |req| {
                req.eip712_meta
                    .paymaster_params
                    .as_ref()
                    .map(|p| p.minimal_allowance())
                    == Some(U256::from_dec_str("100000000000000000000").unwrap())
            })
            .returning(|_| Ok(U256::from(50_000)));

        let native_proxy = oracles().native_usd;
        network.expect_read_dapi().times(4).returning(move |_, proxy| {
            if proxy == native_proxy {
                Ok(U256::exp10(18) * 2000)
            } else {
                Ok(U256::exp10(18))
            }
        });

        let greeting = Arc::new(Mutex::new("old greeting".to_string()));
        let read = greeting.clone();
        network
            .expect_greeting()
            .returning(move |_| Ok(read.lock().unwrap().clone()));

        let allowances = Arc::new(Mutex::new(Vec::new()));
        let seen = allowances.clone();
        let mut sent = 0;
        network
            .expect_send_raw_transaction()
            .times(2)
            .returning(move |raw: Bytes| {
                sent += 1;
                seen.lock().unwrap().push(allowance_of(&raw));
                *greeting.lock().unwrap() = format!("greeting {}", sent);
                Ok(H256::from_low_u64_be(sent))
            });
        network.expect_wait_for_receipt().times(2).returning(|hash| {
            Ok(TransactionReceipt {
                transaction_hash: hash,
                block_number: Some(U64::from(1)),
                status: Some(U64::from(1)),
                ..Default::default()
            })
        });

        // Holder is sponsored for free, the non-holder pays the token fee
        let mut balance_reads = 0;
        network
            .expect_token_balance()
            .times(4)
            .returning(move |_, owner| {
                balance_reads += 1;
                if balance_reads > 2 && owner == non_holder_address {
                    Ok(before - token_fee)
                } else {
                    Ok(before)
                }
            });

        let sender = TransactionSender::new(Arc::new(network), 50_000);
        let flow = SponsoredFlow::new(&sender, contracts(), oracles(), placeholder());

        let (outcomes, reports) = flow
            .execute(&[
                (WalletRole::NftHolder, &holder, "This is a Free Transaction"),
                (WalletRole::NonHolder, &non_holder, "This Greeting Cost USDC"),
            ])
            .await
            .unwrap();

        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].quote.token_fee, token_fee);
        assert_eq!(outcomes[0].greeting_before, "old greeting");
        assert_eq!(outcomes[0].greeting_after, "greeting 1");
        assert_eq!(outcomes[1].greeting_after, "greeting 2");

        for allowance in allowances.lock().unwrap().iter() {
            assert!(*allowance >= token_fee);
            assert!(*allowance < placeholder());
        }

        assert_eq!(reports[0].fee_paid, U256::zero());
        assert_eq!(reports[1].fee_paid, token_fee);
        assert_eq!(reports[1].before - reports[1].after, reports[1].fee_paid);
    }

    #[tokio::test]
    async fn test_zero_token_price_stops_before_submission() {
        let (holder, _) = wallets();

        let mut network = MockPaymasterNetwork::new();
        network.expect_chain_id().return_const(280u64);
        network.expect_gas_price().returning(|| Ok(U256::from(100)));
        network
            .expect_estimate_gas()
            .returning(|_| Ok(U256::from(50_000)));
        let native_proxy = oracles().native_usd;
        network.expect_read_dapi().returning(move |_, proxy| {
            if proxy == native_proxy {
                Ok(U256::from(2000))
            } else {
                Ok(U256::zero())
            }
        });
        network.expect_send_raw_transaction().never();

        let sender = TransactionSender::new(Arc::new(network), 50_000);
        let flow = SponsoredFlow::new(&sender, contracts(), oracles(), placeholder());

        let err = flow
            .send_greeting(WalletRole::NonHolder, &holder, "This Greeting Cost USDC")
            .await
            .unwrap_err();
        assert!(matches!(err, PaymasterError::DivisionByZero(_)));
    }

    #[test]
    fn test_balance_growth_is_an_error() {
        let err = BalanceReport::new(
            WalletRole::NonHolder,
            Address::zero(),
            U256::from(1),
            U256::from(2),
        )
        .unwrap_err();
        assert!(matches!(err, PaymasterError::Internal(_)));
    }

    #[test]
    fn test_display_amount() {
        assert_eq!(display_amount(U256::exp10(18) * 5000, 18), "5000.000000000000000000");
        assert_eq!(display_amount(U256::from(10_000_000_000u64), 18), "0.000000010000000000");
    }
}
