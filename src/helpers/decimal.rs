use ethers::types::U256;
use serde::Deserialize;
use serde_with::DeserializeAs;

/// Helper for deserializing relay amounts, which arrive as decimal strings (`"476190476193"`),
/// `0x`-prefixed hex strings or plain JSON numbers, into a [`U256`].
pub struct DecimalU256;

#[derive(Deserialize)]
#[serde(untagged)]
enum RawAmount {
    Text(String),
    Number(u64),
}

impl<'de> DeserializeAs<'de, U256> for DecimalU256 {
    fn deserialize_as<D>(deserializer: D) -> Result<U256, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let text = match RawAmount::deserialize(deserializer)? {
            RawAmount::Number(number) => return Ok(U256::from(number)),
            RawAmount::Text(text) => text,
        };

        let parsed = match text.strip_prefix("0x") {
            Some(hex) => U256::from_str_radix(hex, 16).ok(),
            None => U256::from_dec_str(&text).ok(),
        };

        parsed.ok_or_else(|| {
            serde::de::Error::invalid_value(
                serde::de::Unexpected::Str(&text),
                &"a decimal or 0x-prefixed amount",
            )
        })
    }
}
