use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Supported donation currencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Currency {
    Icp,
    CkBtc,
    CkEth,
    CkUsdc,
}

impl Currency {
    /// All supported currencies in declaration order.
    pub const ALL: [Currency; 4] = [
        Currency::Icp,
        Currency::CkBtc,
        Currency::CkEth,
        Currency::CkUsdc,
    ];

    /// Decimal places of the smallest unit.
    pub fn decimals(&self) -> u32 {
        match self {
            Currency::Icp => 8,
            Currency::CkBtc => 8,
            Currency::CkEth => 18,
            Currency::CkUsdc => 6,
        }
    }

    /// Ticker code as displayed to users.
    pub fn code(&self) -> &'static str {
        match self {
            Currency::Icp => "ICP",
            Currency::CkBtc => "ckBTC",
            Currency::CkEth => "ckETH",
            Currency::CkUsdc => "ckUSDC",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Error for unrecognized currency codes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown currency code: {0}")]
pub struct UnknownCurrency(pub String);

impl FromStr for Currency {
    type Err = UnknownCurrency;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ICP" => Ok(Currency::Icp),
            "ckBTC" => Ok(Currency::CkBtc),
            "ckETH" => Ok(Currency::CkEth),
            "ckUSDC" => Ok(Currency::CkUsdc),
            other => Err(UnknownCurrency(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decimals() {
        assert_eq!(Currency::Icp.decimals(), 8);
        assert_eq!(Currency::CkBtc.decimals(), 8);
        assert_eq!(Currency::CkEth.decimals(), 18);
        assert_eq!(Currency::CkUsdc.decimals(), 6);
    }

    #[test]
    fn test_code_roundtrip() {
        for currency in Currency::ALL {
            assert_eq!(currency.code().parse::<Currency>().unwrap(), currency);
        }
    }

    #[test]
    fn test_unknown_code() {
        let err = "DOGE".parse::<Currency>().unwrap_err();
        assert_eq!(err, UnknownCurrency("DOGE".to_string()));
    }
}
