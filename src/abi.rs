use alloy_dyn_abi::{DynSolValue, FunctionExt, JsonAbiExt};
use alloy_json_abi::{Function, JsonAbi};
use alloy_primitives::{Address, U256};

use crate::errors::{EngineError, EngineResult};

pub const BLOCK_REWARD_ABI: &str = r#"[
  {"type":"function","name":"getReward","stateMutability":"view",
   "inputs":[{"name":"number","type":"uint256"}],
   "outputs":[{"name":"amount","type":"uint256"}]},
  {"type":"function","name":"reward","stateMutability":"payable",
   "inputs":[],"outputs":[]}
]"#;

pub const DELEGATED_POS_ABI: &str = r#"[
  {"type":"function","name":"signerAddress","stateMutability":"view",
   "inputs":[],"outputs":[{"name":"","type":"address"}]}
]"#;

pub const BLACKLIST_REGISTRY_ABI: &str = r#"[
  {"type":"function","name":"enumerate","stateMutability":"view",
   "inputs":[],"outputs":[{"name":"","type":"address[]"}]},
  {"type":"function","name":"enumerateDrainable","stateMutability":"view",
   "inputs":[],"outputs":[{"name":"","type":"address[]"}]}
]"#;

pub const SPORK_REGISTRY_ABI: &str = r#"[
  {"type":"function","name":"consensusGasLimits","stateMutability":"view",
   "inputs":[],
   "outputs":[{"name":"callGas","type":"uint256"},{"name":"xferGas","type":"uint256"}]}
]"#;

pub const MASTERNODE_REGISTRY_ABI: &str = r#"[
  {"type":"function","name":"enumerateActive","stateMutability":"view",
   "inputs":[],"outputs":[{"name":"","type":"address[]"}]}
]"#;

pub const TREASURY_ABI: &str = r#"[
  {"type":"function","name":"contribute","stateMutability":"payable",
   "inputs":[],"outputs":[]}
]"#;

/// Decodes an embedded ABI. Failure is a build defect, so it aborts.
pub fn parse_abi(json: &str) -> JsonAbi {
    serde_json::from_str(json).expect("embedded contract ABI must decode")
}

pub fn function<'a>(abi: &'a JsonAbi, name: &str) -> EngineResult<&'a Function> {
    abi.function(name)
        .and_then(|functions| functions.first())
        .ok_or_else(|| EngineError::Abi(format!("missing function {name}")))
}

pub fn pack_call(abi: &JsonAbi, name: &str, args: &[DynSolValue]) -> EngineResult<Vec<u8>> {
    function(abi, name)?
        .abi_encode_input(args)
        .map_err(|err| EngineError::Abi(format!("packing {name}: {err}")))
}

pub fn unpack_outputs(abi: &JsonAbi, name: &str, data: &[u8]) -> EngineResult<Vec<DynSolValue>> {
    function(abi, name)?
        .abi_decode_output(data, true)
        .map_err(|err| EngineError::Abi(format!("unpacking {name}: {err}")))
}

pub fn unpack_address(abi: &JsonAbi, name: &str, data: &[u8]) -> EngineResult<Address> {
    let outputs = unpack_outputs(abi, name, data)?;
    outputs
        .first()
        .and_then(DynSolValue::as_address)
        .ok_or_else(|| EngineError::Abi(format!("{name} did not return an address")))
}

pub fn unpack_address_array(abi: &JsonAbi, name: &str, data: &[u8]) -> EngineResult<Vec<Address>> {
    let outputs = unpack_outputs(abi, name, data)?;
    let entries = outputs
        .first()
        .and_then(DynSolValue::as_array)
        .ok_or_else(|| EngineError::Abi(format!("{name} did not return an array")))?;
    entries
        .iter()
        .map(|entry| {
            entry
                .as_address()
                .ok_or_else(|| EngineError::Abi(format!("{name} entry is not an address")))
        })
        .collect()
}

pub fn unpack_uint_pair(abi: &JsonAbi, name: &str, data: &[u8]) -> EngineResult<(U256, U256)> {
    let outputs = unpack_outputs(abi, name, data)?;
    let first = outputs
        .first()
        .and_then(DynSolValue::as_uint)
        .ok_or_else(|| EngineError::Abi(format!("{name} output 0 is not a uint")))?;
    let second = outputs
        .get(1)
        .and_then(DynSolValue::as_uint)
        .ok_or_else(|| EngineError::Abi(format!("{name} output 1 is not a uint")))?;
    Ok((first.0, second.0))
}

pub fn unpack_uint(abi: &JsonAbi, name: &str, data: &[u8]) -> EngineResult<U256> {
    let outputs = unpack_outputs(abi, name, data)?;
    outputs
        .first()
        .and_then(DynSolValue::as_uint)
        .map(|(value, _)| value)
        .ok_or_else(|| EngineError::Abi(format!("{name} did not return a uint")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;

    #[test]
    fn embedded_abis_decode() {
        for json in [
            BLOCK_REWARD_ABI,
            DELEGATED_POS_ABI,
            BLACKLIST_REGISTRY_ABI,
            SPORK_REGISTRY_ABI,
            MASTERNODE_REGISTRY_ABI,
            TREASURY_ABI,
        ] {
            parse_abi(json);
        }
    }

    #[test]
    fn packs_selector_for_signer_address() {
        let abi = parse_abi(DELEGATED_POS_ABI);
        let input = pack_call(&abi, "signerAddress", &[]).unwrap();
        assert_eq!(input.len(), 4);
        assert_eq!(
            input,
            function(&abi, "signerAddress").unwrap().selector().to_vec()
        );
    }

    #[test]
    fn unpacks_address_output() {
        let abi = parse_abi(DELEGATED_POS_ABI);
        let signer = address!("00000000000000000000000000000000deadbeef");
        let mut encoded = [0u8; 32];
        encoded[12..].copy_from_slice(signer.as_slice());
        let decoded = unpack_address(&abi, "signerAddress", &encoded).unwrap();
        assert_eq!(decoded, signer);
    }

    #[test]
    fn unpacks_gas_limit_pair() {
        let abi = parse_abi(SPORK_REGISTRY_ABI);
        let mut encoded = Vec::new();
        encoded.extend_from_slice(&U256::from(30_000_000u64).to_be_bytes::<32>());
        encoded.extend_from_slice(&U256::from(3_000_000u64).to_be_bytes::<32>());
        let (call_gas, xfer_gas) = unpack_uint_pair(&abi, "consensusGasLimits", &encoded).unwrap();
        assert_eq!(call_gas, U256::from(30_000_000u64));
        assert_eq!(xfer_gas, U256::from(3_000_000u64));
    }

    #[test]
    fn missing_function_is_an_abi_error() {
        let abi = parse_abi(TREASURY_ABI);
        let err = pack_call(&abi, "withdraw", &[]).unwrap_err();
        assert!(matches!(err, EngineError::Abi(_)));
    }
}
