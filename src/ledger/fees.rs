use crate::params::ProtocolParams;
use crate::value::Value;

/// The ledger's linear fee polynomial `a * size + b`.
#[derive(Clone, Debug)]
pub struct LinearFee {
    coefficient: Value,
    constant: Value,
}

impl LinearFee {
    pub fn new(params: &ProtocolParams) -> Self {
        LinearFee {
            coefficient: params.fee_coefficient.clone(),
            constant: params.fee_constant.clone(),
        }
    }

    pub fn fee_for_size(&self, size: usize) -> Value {
        let mut fee = &self.coefficient * size as u64;
        fee += &self.constant;
        fee
    }

    /// Size-proportional part only, used for marginal input/output
    /// contributions.
    pub fn marginal_fee(&self, size: usize) -> Value {
        &self.coefficient * size as u64
    }
}
