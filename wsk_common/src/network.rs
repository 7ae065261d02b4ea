use crate::Error;
use std::fmt;
use std::str::FromStr;

/// The chain flavor the service is pointed at.
///
/// Address derivation (human readable parts, base58 prefixes) is the only
/// thing that differs between networks at this layer; RPC and indexer
/// endpoints are configured separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Network {
    Mainnet,
    Testnet,
    Regtest,
}

impl Network {
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
            Network::Regtest => "regtest",
        }
    }

    /// Human readable part for the chain-native `p2op` address form.
    pub fn p2op_hrp(&self) -> &'static str {
        match self {
            Network::Mainnet => "opb",
            Network::Testnet => "topb",
            Network::Regtest => "ropb",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Network {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mainnet" => Ok(Network::Mainnet),
            "testnet" => Ok(Network::Testnet),
            "regtest" => Ok(Network::Regtest),
            other => Err(Error::InvalidNetwork(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_roundtrip() {
        for net in [Network::Mainnet, Network::Testnet, Network::Regtest] {
            assert_eq!(net.as_str().parse::<Network>().unwrap(), net);
        }
        assert!("signet".parse::<Network>().is_err());
    }
}
