use thiserror::Error;

/// Errors that abort a composition. The ledger-rule kinds carry only
/// their identifier; request-validation kinds add the offending value.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ComposeError {
    /// The selection loop exhausted the remaining UTXO set, or the
    /// max-output finalizer would drop the drained output below its
    /// min-ada.
    #[error("UTXO_BALANCE_INSUFFICIENT")]
    UtxoBalanceInsufficient,

    /// An explicit token-free output amount below the ledger's min-ada.
    #[error("UTXO_VALUE_TOO_SMALL")]
    UtxoValueTooSmall,

    /// Certificate tag outside the supported stake operations.
    #[error("UNSUPPORTED_CERTIFICATE_TYPE")]
    UnsupportedCertificateType,

    /// Serialized body larger than the protocol's transaction limit.
    #[error("MAX_TX_SIZE_REACHED")]
    MaxTxSizeReached,

    /// A single output's value field larger than the protocol limit.
    #[error("MAX_VALUE_SIZE_REACHED")]
    MaxValueSizeReached,

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("codec: {0}")]
    Codec(String),
}

impl ComposeError {
    /// Stable identifier of the error kind, suitable for wire protocols.
    pub fn kind(&self) -> &'static str {
        match self {
            ComposeError::UtxoBalanceInsufficient => "UTXO_BALANCE_INSUFFICIENT",
            ComposeError::UtxoValueTooSmall => "UTXO_VALUE_TOO_SMALL",
            ComposeError::UnsupportedCertificateType => "UNSUPPORTED_CERTIFICATE_TYPE",
            ComposeError::MaxTxSizeReached => "MAX_TX_SIZE_REACHED",
            ComposeError::MaxValueSizeReached => "MAX_VALUE_SIZE_REACHED",
            ComposeError::InvalidAddress(_) => "INVALID_ADDRESS",
            ComposeError::InvalidRequest(_) => "INVALID_REQUEST",
            ComposeError::Codec(_) => "CODEC_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ledger_kinds_display_their_identifier() {
        assert_eq!(
            ComposeError::UtxoBalanceInsufficient.to_string(),
            "UTXO_BALANCE_INSUFFICIENT"
        );
        assert_eq!(
            ComposeError::MaxTxSizeReached.kind(),
            ComposeError::MaxTxSizeReached.to_string()
        );
    }
}
