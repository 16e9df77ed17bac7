use crate::value::Value;
use serde::Deserialize;

/// Protocol parameters the composition math depends on. Defaults match
/// Cardano mainnet.
#[derive(Clone, Debug)]
pub struct ProtocolParams {
    /// Linear fee coefficient (`a` in `a * size + b`).
    pub fee_coefficient: Value,
    /// Linear fee constant (`b`).
    pub fee_constant: Value,
    pub coins_per_utxo_byte: Value,
    pub max_value_size: u32,
    pub max_tx_size: u32,
    pub key_deposit: Value,
    pub pool_deposit: Value,
    /// Change outputs split once they would carry this many token units.
    pub max_tokens_per_output: usize,
    /// Smallest leftover worth pulling another UTXO for; anything below
    /// burns as fee.
    pub dust_threshold: Value,
}

impl ProtocolParams {
    pub fn mainnet() -> Self {
        ProtocolParams {
            fee_coefficient: Value::from(44),
            fee_constant: Value::from(155_381),
            coins_per_utxo_byte: Value::from(4_310),
            max_value_size: 5_000,
            max_tx_size: 16_384,
            key_deposit: Value::from(2_000_000),
            pool_deposit: Value::from(500_000_000),
            max_tokens_per_output: 100,
            dust_threshold: Value::from(5_000),
        }
    }

    /// Applies caller overrides. Unknown option keys were already
    /// dropped during deserialization.
    pub fn with_options(mut self, options: &ComposeOptions) -> Self {
        if let Some(cap) = options.max_tokens_per_output {
            self.max_tokens_per_output = (cap as usize).max(1);
        }
        if let Some(fee_params) = &options.fee_params {
            if let Some(a) = &fee_params.a {
                self.fee_coefficient = a.clone();
            }
        }
        self
    }
}

impl Default for ProtocolParams {
    fn default() -> Self {
        ProtocolParams::mainnet()
    }
}

/// Caller-tunable knobs. Field names follow the wire protocol; unknown
/// keys are ignored.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ComposeOptions {
    #[serde(rename = "_maxTokensPerOutput", default)]
    pub max_tokens_per_output: Option<u32>,
    #[serde(rename = "feeParams", default)]
    pub fee_params: Option<FeeParams>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct FeeParams {
    #[serde(default)]
    pub a: Option<Value>,
}
