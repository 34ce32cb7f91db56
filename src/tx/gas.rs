//! Fee estimation and conversion into the sponsoring token
//!
//! The allowance a sponsored call needs depends on its fee, but the fee
//! estimate itself needs paymaster params with some allowance. Estimation
//! therefore runs with an oversized placeholder, and the real allowance is
//! requoted from the estimate afterwards.

use super::paymaster::PaymasterParams;
use crate::error::{PaymasterError, PaymasterResult};

use ethers::types::{Address, U256};
use tracing::{debug, warn};

/// Oracle readings used to price the fee, both against the same fiat unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OraclePrices {
    pub native: U256,
    pub token: U256,
}

/// Fee of one sponsored call in native and token denomination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeQuote {
    pub gas_price: U256,
    pub gas_limit: U256,
    pub native_fee: U256,
    pub prices: OraclePrices,
    pub token_fee: U256,
}

impl FeeQuote {
    pub fn new(gas_price: U256, gas_limit: U256, prices: OraclePrices) -> PaymasterResult<Self> {
        let native_fee = native_fee(gas_price, gas_limit)?;
        let token_fee = convert_to_token(native_fee, prices)?;

        Ok(Self {
            gas_price,
            gas_limit,
            native_fee,
            prices,
            token_fee,
        })
    }
}

/// `gas_price * gas_limit`
pub fn native_fee(gas_price: U256, gas_limit: U256) -> PaymasterResult<U256> {
    gas_price
        .checked_mul(gas_limit)
        .ok_or_else(|| PaymasterError::Overflow("native fee".to_string()))
}

/// `native_fee * price_native / price_token`, truncating
pub fn convert_to_token(native_fee: U256, prices: OraclePrices) -> PaymasterResult<U256> {
    if prices.token.is_zero() {
        return Err(PaymasterError::DivisionByZero("token".to_string()));
    }
    if prices.native.is_zero() {
        return Err(PaymasterError::ZeroOraclePrice {
            feed: "native".to_string(),
        });
    }

    let scaled = native_fee
        .checked_mul(prices.native)
        .ok_or_else(|| PaymasterError::Overflow("token fee".to_string()))?;

    Ok(scaled / prices.token)
}

/// Builds the paymaster params for the estimate and the final submission
pub struct GasEstimator {
    paymaster: Address,
    token: Address,
    /// Allowance used only while estimating; must exceed any real fee
    estimation_allowance: U256,
}

impl GasEstimator {
    pub fn new(paymaster: Address, token: Address, estimation_allowance: U256) -> Self {
        Self {
            paymaster,
            token,
            estimation_allowance,
        }
    }

    /// Params carrying the oversized placeholder allowance
    pub fn estimation_params(&self) -> PaymasterParams {
        PaymasterParams::approval_based(self.paymaster, self.token, self.estimation_allowance)
    }

    /// Params for the real submission: allowance is exactly the quoted token fee
    pub fn final_params(&self, quote: &FeeQuote) -> PaymasterParams {
        if quote.token_fee > self.estimation_allowance {
            // Known limitation: the estimate ran with less allowance than the call needs
            warn!(
                "Token fee {} exceeds estimation allowance {}; gas estimate may be low",
                quote.token_fee, self.estimation_allowance
            );
        }

        let params = PaymasterParams::approval_based(self.paymaster, self.token, quote.token_fee);
        debug!("Final paymaster allowance: {}", quote.token_fee);
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prices(native: u64, token: u64) -> OraclePrices {
        OraclePrices {
            native: U256::from(native),
            token: U256::from(token),
        }
    }

    #[test]
    fn test_reference_scenario() {
        let quote = FeeQuote::new(U256::from(100), U256::from(50_000), prices(2000, 1)).unwrap();
        assert_eq!(quote.native_fee, U256::from(5_000_000u64));
        assert_eq!(quote.token_fee, U256::from(10_000_000_000u64));
    }

    #[test]
    fn test_conversion_matches_formula() {
        let cases = [
            (250_000_000u64, 1_234_567u64, 1_850_120_000_000_000_000_000u128, 999_900_000_000_000_000u128),
            (1, 1, 1, 1),
            (7, 3, 5, 2),
            (25_000_000, 600_000, 3_000_000_000_000_000_000_000, 1_000_000_000_000_000_000),
        ];

        for (gas_price, gas_units, native, token) in cases {
            let quote = FeeQuote::new(
                U256::from(gas_price),
                U256::from(gas_units),
                OraclePrices {
                    native: U256::from(native),
                    token: U256::from(token),
                },
            )
            .unwrap();

            let expected = U256::from(gas_price) * U256::from(gas_units) * U256::from(native)
                / U256::from(token);
            assert_eq!(quote.token_fee, expected);
        }
    }

    #[test]
    fn test_zero_token_price_is_division_by_zero() {
        let err = FeeQuote::new(U256::from(100), U256::from(50_000), prices(2000, 0)).unwrap_err();
        assert!(matches!(err, PaymasterError::DivisionByZero(_)));
    }

    #[test]
    fn test_zero_native_price_rejected() {
        let err = convert_to_token(U256::from(5_000_000u64), prices(0, 1)).unwrap_err();
        assert!(matches!(err, PaymasterError::ZeroOraclePrice { .. }));
    }

    #[test]
    fn test_overflow_is_reported() {
        let err = native_fee(U256::MAX, U256::from(2)).unwrap_err();
        assert!(matches!(err, PaymasterError::Overflow(_)));

        let err = convert_to_token(U256::MAX, prices(2, 1)).unwrap_err();
        assert!(matches!(err, PaymasterError::Overflow(_)));
    }

    #[test]
    fn test_final_allowance_covers_fee() {
        let allowance = U256::from_dec_str("100000000000000000000").unwrap();
        let estimator = GasEstimator::new(
            Address::from_low_u64_be(1),
            Address::from_low_u64_be(2),
            allowance,
        );
        assert_eq!(estimator.estimation_params().minimal_allowance(), allowance);

        let quote = FeeQuote::new(U256::from(100), U256::from(50_000), prices(2000, 1)).unwrap();
        let params = estimator.final_params(&quote);
        assert!(params.minimal_allowance() >= quote.token_fee);
        assert_eq!(params.paymaster(), Address::from_low_u64_be(1));
    }
}
