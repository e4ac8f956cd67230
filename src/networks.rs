use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Network {
    Localnet,
    Studionet,
    TestnetAsimov,
}

/// Resolved network parameters, persisted as a JSON blob under the
/// `network` config key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkDescriptor {
    pub name: String,
    pub alias: String,
    #[serde(rename = "chainId")]
    pub chain_id: u64,
    #[serde(rename = "rpcUrl")]
    pub rpc_url: String,
    #[serde(rename = "explorerUrl")]
    pub explorer_url: Option<String>,
}

impl Network {
    pub const ALL: [Network; 3] = [Network::Localnet, Network::Studionet, Network::TestnetAsimov];

    pub fn descriptor(&self) -> NetworkDescriptor {
        match self {
            Network::Localnet => NetworkDescriptor {
                name: "localnet".to_string(),
                alias: "GenLayer Localnet".to_string(),
                chain_id: 61_999,
                rpc_url: "http://localhost:4000/api".to_string(),
                explorer_url: None,
            },
            Network::Studionet => NetworkDescriptor {
                name: "studionet".to_string(),
                alias: "GenLayer Studio".to_string(),
                chain_id: 61_999,
                rpc_url: "https://studio.genlayer.com/api".to_string(),
                explorer_url: None,
            },
            Network::TestnetAsimov => NetworkDescriptor {
                name: "testnet-asimov".to_string(),
                alias: "GenLayer Testnet Asimov".to_string(),
                chain_id: 4_221,
                rpc_url: "https://genlayer-testnet.rpc.caldera.xyz/http".to_string(),
                explorer_url: Some("https://genlayer-testnet.explorer.caldera.xyz".to_string()),
            },
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Network::Localnet => write!(f, "localnet"),
            Network::Studionet => write!(f, "studionet"),
            Network::TestnetAsimov => write!(f, "testnet-asimov"),
        }
    }
}

impl FromStr for Network {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "localnet" => Ok(Network::Localnet),
            "studionet" => Ok(Network::Studionet),
            "testnet-asimov" => Ok(Network::TestnetAsimov),
            _ => anyhow::bail!(
                "Invalid network: {}. Allowed values: localnet, studionet, testnet-asimov",
                s
            ),
        }
    }
}

/// An LLM backend plugin and the models it serves. Static data, never
/// mutated at runtime.
#[derive(Debug, Clone, Copy)]
pub struct ProviderDescriptor {
    pub key: &'static str,
    pub plugin: &'static str,
    pub models: &'static [&'static str],
    pub default_model: &'static str,
}

pub const PROVIDERS: &[ProviderDescriptor] = &[
    ProviderDescriptor {
        key: "ollama",
        plugin: "ollama",
        models: &["llama3", "llama3.1", "mistral", "gemma"],
        default_model: "llama3",
    },
    ProviderDescriptor {
        key: "openai",
        plugin: "openai-compatible",
        models: &["gpt-4o", "gpt-4o-mini", "o1-mini"],
        default_model: "gpt-4o",
    },
    ProviderDescriptor {
        key: "heuristai",
        plugin: "openai-compatible",
        models: &[
            "meta-llama/llama-3.1-70b-instruct",
            "mistralai/mixtral-8x22b-instruct",
        ],
        default_model: "meta-llama/llama-3.1-70b-instruct",
    },
];

pub fn provider(key: &str) -> Option<&'static ProviderDescriptor> {
    PROVIDERS.iter().find(|p| p.key == key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_parsing() {
        assert_eq!("localnet".parse::<Network>().unwrap(), Network::Localnet);
        assert_eq!("studionet".parse::<Network>().unwrap(), Network::Studionet);
        assert_eq!(
            "testnet-asimov".parse::<Network>().unwrap(),
            Network::TestnetAsimov
        );
        assert_eq!("Localnet".parse::<Network>().unwrap(), Network::Localnet);
        assert!("mainnet".parse::<Network>().is_err());
    }

    #[test]
    fn test_descriptor_round_trip() {
        for network in Network::ALL {
            let descriptor = network.descriptor();
            let blob = serde_json::to_value(&descriptor).unwrap();
            let back: NetworkDescriptor = serde_json::from_value(blob).unwrap();
            assert_eq!(back, descriptor);
            assert_eq!(descriptor.name, network.to_string());
        }
    }

    #[test]
    fn test_provider_lookup() {
        let ollama = provider("ollama").unwrap();
        assert!(ollama.models.contains(&ollama.default_model));
        assert!(provider("nonexistent").is_none());
    }
}
