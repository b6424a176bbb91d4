use crate::chain::{Chain, ChainError, Result};
use alloy::primitives::{Address, B256};
use std::env;
use std::str::FromStr;

pub const DEFAULT_SIP_TOKEN: &str = "0xa7E756116aC6b0819e0d7f7354C21417e1e0b2A7";

/// Keys the chain service needs; missing ones are reported at startup.
pub const WEB3_ENV_VARS: [&str; 6] = [
    "AI_AGENT_PRIVATE_KEY",
    "USER_WALLET_ADDRESS",
    "SIP_TOKEN_ADDRESS",
    "FUJI_HOME_CONTRACT",
    "ECHO_REMOTE_CONTRACT",
    "DISPATCH_REMOTE_CONTRACT",
];

pub const LLM_PROVIDERS: [(&str, &str); 5] = [
    ("OpenAI", "OPENAI_API_KEY"),
    ("Anthropic", "ANTHROPIC_API_KEY"),
    ("OpenRouter", "OPENROUTER_API_KEY"),
    ("Google AI", "GOOGLE_GENERATIVE_AI_API_KEY"),
    ("Ollama", "OLLAMA_API_ENDPOINT"),
];

struct ChainDefaults {
    chain: Chain,
    chain_id: u64,
    name: &'static str,
    rpc_url: &'static str,
    contract: &'static str,
    blockchain_id: &'static str,
    env_prefix: &'static str,
    contract_env: &'static str,
}

const CHAIN_DEFAULTS: [ChainDefaults; 3] = [
    ChainDefaults {
        chain: Chain::Fuji,
        chain_id: 43113,
        name: "Avalanche Fuji",
        rpc_url: "https://api.avax-test.network/ext/bc/C/rpc",
        contract: "0xD3f07713bB0D4816E23Ec66C666E0e7721C3b337",
        blockchain_id: "0x7fc93d85c6d62c5b2ac0b519c87010ea5294012d1e407030d6acd0021cac10d5",
        env_prefix: "FUJI",
        contract_env: "FUJI_HOME_CONTRACT",
    },
    ChainDefaults {
        chain: Chain::Echo,
        chain_id: 173750,
        name: "Avalanche Echo",
        rpc_url: "https://subnets.avax.network/echo/testnet/rpc",
        contract: "0xD3f07713bB0D4816E23Ec66C666E0e7721C3b337",
        blockchain_id: "0x1278d1be4b987e847be3465940eb5066c4604a7fbd6e086900823597d81af4c1",
        env_prefix: "ECHO",
        contract_env: "ECHO_REMOTE_CONTRACT",
    },
    ChainDefaults {
        chain: Chain::Dispatch,
        chain_id: 779672,
        name: "Avalanche Dispatch",
        rpc_url: "https://subnets.avax.network/dispatch/testnet/rpc",
        contract: "0xa7E756116aC6b0819e0d7f7354C21417e1e0b2A7",
        blockchain_id: "0x9f3be606497285d0ffbb5ac9ba24aa60346a9b1812479ed66cb329f394a4b1c7",
        env_prefix: "DISPATCH",
        contract_env: "DISPATCH_REMOTE_CONTRACT",
    },
];

/// Network settings for one chain.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainConfig {
    pub chain: Chain,
    pub chain_id: u64,
    pub name: String,
    pub rpc_url: String,
    /// Home contract on Fuji, remote token contract elsewhere.
    pub contract_address: Address,
    pub blockchain_id: B256,
}

#[derive(Clone)]
pub struct SipConfig {
    pub eliza_server_url: String,
    pub entity_id: String,
    pub channels: Vec<String>,
    pub private_key: Option<String>,
    /// Portfolio owner reported by the portfolio provider; the agent wallet when unset.
    pub user_address: Option<Address>,
    pub token_address: Address,
    pub fuji: ChainConfig,
    pub echo: ChainConfig,
    pub dispatch: ChainConfig,
}

// Keeps the private key out of debug output.
impl std::fmt::Debug for SipConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SipConfig")
            .field("eliza_server_url", &self.eliza_server_url)
            .field("entity_id", &self.entity_id)
            .field("channels", &self.channels)
            .field("private_key", &self.private_key.as_ref().map(|_| "<redacted>"))
            .field("user_address", &self.user_address)
            .field("token_address", &self.token_address)
            .field("fuji", &self.fuji)
            .field("echo", &self.echo)
            .field("dispatch", &self.dispatch)
            .finish()
    }
}

impl SipConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup; empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let entity_id = get("SIP_AGENT_ENTITY_ID").unwrap_or_else(|| {
            let generated = uuid::Uuid::new_v4().to_string();
            tracing::warn!(entity_id = %generated, "SIP_AGENT_ENTITY_ID not set, using a fresh id");
            generated
        });

        let channels = get("SIP_AGENT_CHANNELS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|c| !c.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        let user_address = get("USER_WALLET_ADDRESS")
            .map(|raw| parse_address("USER_WALLET_ADDRESS", &raw))
            .transpose()?;

        let token_address = parse_address(
            "SIP_TOKEN_ADDRESS",
            &get("SIP_TOKEN_ADDRESS").unwrap_or_else(|| DEFAULT_SIP_TOKEN.to_string()),
        )?;

        let [fuji, echo, dispatch] = CHAIN_DEFAULTS;
        Ok(Self {
            eliza_server_url: get("ELIZA_SERVER_URL")
                .unwrap_or_else(|| "http://localhost:3000".to_string()),
            entity_id,
            channels,
            private_key: get("AI_AGENT_PRIVATE_KEY"),
            user_address,
            token_address,
            fuji: chain_config(&fuji, &get)?,
            echo: chain_config(&echo, &get)?,
            dispatch: chain_config(&dispatch, &get)?,
        })
    }

    pub fn chain(&self, chain: Chain) -> &ChainConfig {
        match chain {
            Chain::Fuji => &self.fuji,
            Chain::Echo => &self.echo,
            Chain::Dispatch => &self.dispatch,
        }
    }

    /// Logs which parts of the environment are configured.
    pub fn log_status(&self) {
        let missing: Vec<&str> = WEB3_ENV_VARS
            .iter()
            .copied()
            .filter(|key| env::var(key).map(|v| v.is_empty()).unwrap_or(true))
            .collect();
        if missing.is_empty() {
            tracing::info!("all web3 environment variables configured");
        } else {
            tracing::warn!(missing = %missing.join(", "), "some web3 features may not work");
        }

        tracing::info!(
            wallet = if self.private_key.is_some() { "configured" } else { "missing" },
            token = %self.token_address,
            user = %self.user_address.map(|a| a.to_string()).unwrap_or_else(|| "agent wallet".into()),
            "network configuration"
        );
        for chain in Chain::ALL {
            let c = self.chain(chain);
            tracing::info!(
                chain = %chain,
                chain_id = c.chain_id,
                rpc = %c.rpc_url,
                contract = %c.contract_address,
                "chain endpoint"
            );
        }

        let llms: Vec<&str> = LLM_PROVIDERS
            .iter()
            .filter(|(_, key)| env::var(key).map(|v| !v.is_empty()).unwrap_or(false))
            .map(|(name, _)| *name)
            .collect();
        if llms.is_empty() {
            tracing::info!("no external LLM configured");
        } else {
            tracing::info!(providers = %llms.join(", "), "LLM providers available");
        }

        tracing::info!(
            channels = %self.channels.join(","),
            entity_id = %self.entity_id,
            server = %self.eliza_server_url,
            "agent identity"
        );
    }
}

fn chain_config<F>(defaults: &ChainDefaults, get: &F) -> Result<ChainConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let rpc_url = get(&format!("{}_RPC_URL", defaults.env_prefix))
        .unwrap_or_else(|| defaults.rpc_url.to_string());
    let contract = get(defaults.contract_env).unwrap_or_else(|| defaults.contract.to_string());
    let blockchain_key = format!("{}_BLOCKCHAIN_ID", defaults.env_prefix);
    let blockchain_id = get(&blockchain_key).unwrap_or_else(|| defaults.blockchain_id.to_string());

    Ok(ChainConfig {
        chain: defaults.chain,
        chain_id: defaults.chain_id,
        name: defaults.name.to_string(),
        rpc_url,
        contract_address: parse_address(defaults.contract_env, &contract)?,
        blockchain_id: B256::from_str(blockchain_id.trim())
            .map_err(|e| ChainError::Config(format!("{}: {}", blockchain_key, e)))?,
    })
}

fn parse_address(key: &str, raw: &str) -> Result<Address> {
    Address::from_str(raw.trim()).map_err(|e| ChainError::Config(format!("{}: {}", key, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_point_at_public_testnets() {
        let config = SipConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.eliza_server_url, "http://localhost:3000");
        assert!(config.private_key.is_none());
        assert!(config.channels.is_empty());
        assert_eq!(config.fuji.chain_id, 43113);
        assert_eq!(config.echo.chain_id, 173750);
        assert_eq!(config.dispatch.chain_id, 779672);
        assert_eq!(
            config.token_address,
            Address::from_str(DEFAULT_SIP_TOKEN).unwrap()
        );
        assert_eq!(
            config.chain(Chain::Dispatch).rpc_url,
            "https://subnets.avax.network/dispatch/testnet/rpc"
        );
    }

    #[test]
    fn environment_overrides_defaults() {
        let config = SipConfig::from_lookup(lookup(&[
            ("ECHO_RPC_URL", "http://127.0.0.1:8545"),
            ("SIP_AGENT_CHANNELS", " a , b,,c "),
            ("SIP_AGENT_ENTITY_ID", "agent-1"),
            ("AI_AGENT_PRIVATE_KEY", ""),
        ]))
        .unwrap();
        assert_eq!(config.echo.rpc_url, "http://127.0.0.1:8545");
        assert_eq!(config.channels, vec!["a", "b", "c"]);
        assert_eq!(config.entity_id, "agent-1");
        assert!(config.private_key.is_none());
    }

    #[test]
    fn malformed_contract_address_is_rejected() {
        let err = SipConfig::from_lookup(lookup(&[("FUJI_HOME_CONTRACT", "0x1234")])).unwrap_err();
        assert!(err.to_string().contains("FUJI_HOME_CONTRACT"));
    }

    #[test]
    fn debug_output_hides_the_private_key() {
        let config = SipConfig::from_lookup(lookup(&[("AI_AGENT_PRIVATE_KEY", "0xsecret")])).unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("0xsecret"));
        assert!(debug.contains("<redacted>"));
    }
}
