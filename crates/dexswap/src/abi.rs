use num_bigint::BigUint;
use tiny_keccak::{Hasher, Keccak};

use crate::address::Address;
use crate::error::AbiError;

/// Parsed function signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionSignature {
    pub name: String,
    pub params: Vec<ParamType>,
    pub canonical: String,
    pub selector: [u8; 4],
}

/// ABI parameter types, recursive to support tuples and arrays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamType {
    Address,
    Uint(usize),
    Int(usize),
    Bool,
    Bytes,
    FixedBytes(usize),
    String,
    Array(Box<ParamType>),
    FixedArray(Box<ParamType>, usize),
    Tuple(Vec<ParamType>),
}

impl ParamType {
    /// Whether this type is dynamically-sized in ABI encoding.
    pub fn is_dynamic(&self) -> bool {
        match self {
            ParamType::Bytes | ParamType::String => true,
            ParamType::Array(_) => true,
            ParamType::FixedArray(inner, _) => inner.is_dynamic(),
            ParamType::Tuple(members) => members.iter().any(|m| m.is_dynamic()),
            _ => false,
        }
    }

    /// Size of this type's slot in the head section.
    fn head_size(&self) -> usize {
        if self.is_dynamic() {
            return 32;
        }
        match self {
            ParamType::FixedArray(inner, len) => inner.head_size() * len,
            ParamType::Tuple(members) => members.iter().map(|m| m.head_size()).sum(),
            _ => 32,
        }
    }
}

/// An ABI value, used both as call argument and as decoded output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbiValue {
    Address(Address),
    Uint(BigUint),
    Bool(bool),
    Bytes(Vec<u8>),
    FixedBytes(Vec<u8>),
    String(std::string::String),
    Array(Vec<AbiValue>),
    Tuple(Vec<AbiValue>),
}

impl AbiValue {
    pub fn as_uint(&self) -> Option<&BigUint> {
        match self {
            AbiValue::Uint(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_address(&self) -> Option<&Address> {
        match self {
            AbiValue::Address(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AbiValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AbiValue::String(s) => Some(s),
            _ => None,
        }
    }
}

/// A contract function together with its ordered arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionCall {
    pub signature: FunctionSignature,
    pub args: Vec<AbiValue>,
}

impl FunctionCall {
    /// Parse `signature` and pair it with `args`, checking arity up front.
    pub fn new(signature: &str, args: Vec<AbiValue>) -> Result<Self, AbiError> {
        let signature = parse_signature(signature)?;
        if signature.params.len() != args.len() {
            return Err(AbiError::ArgumentCount {
                expected: signature.params.len(),
                actual: args.len(),
            });
        }
        Ok(Self { signature, args })
    }

    /// Selector followed by the ABI-encoded arguments.
    pub fn calldata(&self) -> Result<Vec<u8>, AbiError> {
        encode_call(&self.signature, &self.args)
    }
}

/// Parse a function signature string into a `FunctionSignature`.
///
/// Example: `"getRate(address,address,address)"` → name="getRate", params=[Address; 3]
pub fn parse_signature(sig: &str) -> Result<FunctionSignature, AbiError> {
    let sig = sig.trim();
    let open = sig
        .find('(')
        .ok_or_else(|| AbiError::InvalidSignature(format!("missing '(' in: {sig}")))?;

    if !sig.ends_with(')') {
        return Err(AbiError::InvalidSignature(format!("missing ')' in: {sig}")));
    }

    let name = sig[..open].to_string();
    if name.is_empty() {
        return Err(AbiError::InvalidSignature("empty function name".to_string()));
    }

    let params_str = &sig[open + 1..sig.len() - 1];
    let params = if params_str.is_empty() {
        vec![]
    } else {
        parse_param_list(params_str)?
    };

    let canonical = format!("{}({})", name, canonical_params(&params));
    let selector = selector_from_signature(&canonical);

    Ok(FunctionSignature {
        name,
        params,
        canonical,
        selector,
    })
}

/// Parse a comma-separated list of param types, respecting nested parentheses for tuples.
fn parse_param_list(s: &str) -> Result<Vec<ParamType>, AbiError> {
    let mut result = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;

    for (i, c) in s.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| AbiError::InvalidSignature("unbalanced ')'".to_string()))?;
            }
            ',' if depth == 0 => {
                result.push(parse_param_type(s[start..i].trim())?);
                start = i + 1;
            }
            _ => {}
        }
    }

    if depth != 0 {
        return Err(AbiError::InvalidSignature("unbalanced parentheses".to_string()));
    }

    let last = s[start..].trim();
    if !last.is_empty() {
        result.push(parse_param_type(last)?);
    }

    Ok(result)
}

/// Parse a single param type string.
fn parse_param_type(s: &str) -> Result<ParamType, AbiError> {
    let s = s.trim();

    if let Some(bracket_pos) = s.rfind('[') {
        if s.ends_with(']') {
            let inner = parse_param_type(&s[..bracket_pos])?;
            let size_str = &s[bracket_pos + 1..s.len() - 1];

            if size_str.is_empty() {
                return Ok(ParamType::Array(Box::new(inner)));
            }
            let size: usize = size_str.parse().map_err(|_| {
                AbiError::InvalidSignature(format!("invalid array size: {size_str}"))
            })?;
            return Ok(ParamType::FixedArray(Box::new(inner), size));
        }
    }

    if s.starts_with('(') && s.ends_with(')') {
        let inner = &s[1..s.len() - 1];
        let members = if inner.is_empty() {
            vec![]
        } else {
            parse_param_list(inner)?
        };
        return Ok(ParamType::Tuple(members));
    }

    match s {
        "address" => Ok(ParamType::Address),
        "bool" => Ok(ParamType::Bool),
        "string" => Ok(ParamType::String),
        "bytes" => Ok(ParamType::Bytes),
        _ if s.starts_with("uint") => Ok(ParamType::Uint(parse_width(s, "uint")?)),
        _ if s.starts_with("int") => Ok(ParamType::Int(parse_width(s, "int")?)),
        _ if s.starts_with("bytes") => {
            let size: usize = s[5..]
                .parse()
                .map_err(|_| AbiError::InvalidSignature(format!("invalid bytes width: {s}")))?;
            if size == 0 || size > 32 {
                return Err(AbiError::InvalidSignature(format!("invalid bytes width: {s}")));
            }
            Ok(ParamType::FixedBytes(size))
        }
        _ => Err(AbiError::InvalidSignature(format!("unknown type: {s}"))),
    }
}

fn parse_width(s: &str, prefix: &str) -> Result<usize, AbiError> {
    let rest = &s[prefix.len()..];
    if rest.is_empty() {
        return Ok(256);
    }
    let bits: usize = rest
        .parse()
        .map_err(|_| AbiError::InvalidSignature(format!("invalid {prefix} width: {s}")))?;
    if bits == 0 || bits > 256 || bits % 8 != 0 {
        return Err(AbiError::InvalidSignature(format!("invalid {prefix} width: {s}")));
    }
    Ok(bits)
}

/// Build a canonical param string for selector computation.
fn canonical_params(params: &[ParamType]) -> String {
    params
        .iter()
        .map(canonical_param)
        .collect::<Vec<_>>()
        .join(",")
}

fn canonical_param(p: &ParamType) -> String {
    match p {
        ParamType::Address => "address".to_string(),
        ParamType::Uint(bits) => format!("uint{bits}"),
        ParamType::Int(bits) => format!("int{bits}"),
        ParamType::Bool => "bool".to_string(),
        ParamType::Bytes => "bytes".to_string(),
        ParamType::FixedBytes(size) => format!("bytes{size}"),
        ParamType::String => "string".to_string(),
        ParamType::Array(inner) => format!("{}[]", canonical_param(inner)),
        ParamType::FixedArray(inner, size) => format!("{}[{size}]", canonical_param(inner)),
        ParamType::Tuple(members) => format!("({})", canonical_params(members)),
    }
}

/// Compute the 4-byte selector from a canonical function signature.
pub fn selector_from_signature(canonical: &str) -> [u8; 4] {
    let mut hasher = Keccak::v256();
    hasher.update(canonical.as_bytes());
    let mut hash = [0u8; 32];
    hasher.finalize(&mut hash);
    [hash[0], hash[1], hash[2], hash[3]]
}

/// Encode a full call: selector followed by arguments.
pub fn encode_call(sig: &FunctionSignature, args: &[AbiValue]) -> Result<Vec<u8>, AbiError> {
    let mut out = sig.selector.to_vec();
    out.extend(encode_values(&sig.params, args)?);
    Ok(out)
}

/// ABI-encode a list of values against their parameter types.
pub fn encode_values(params: &[ParamType], values: &[AbiValue]) -> Result<Vec<u8>, AbiError> {
    if params.len() != values.len() {
        return Err(AbiError::ArgumentCount {
            expected: params.len(),
            actual: values.len(),
        });
    }

    let head_len: usize = params.iter().map(|p| p.head_size()).sum();
    let mut head = Vec::with_capacity(head_len);
    let mut tail = Vec::new();

    for (index, (param, value)) in params.iter().zip(values).enumerate() {
        let encoded = encode_value(param, value).map_err(|e| match e {
            AbiError::ArgumentType { .. } => AbiError::ArgumentType {
                index,
                expected: canonical_param(param),
            },
            other => other,
        })?;
        if param.is_dynamic() {
            head.extend(uint_word(&BigUint::from(head_len + tail.len()))?);
            tail.extend(encoded);
        } else {
            head.extend(encoded);
        }
    }

    head.extend(tail);
    Ok(head)
}

fn encode_value(param: &ParamType, value: &AbiValue) -> Result<Vec<u8>, AbiError> {
    let mismatch = || AbiError::ArgumentType {
        index: 0,
        expected: canonical_param(param),
    };

    match (param, value) {
        (ParamType::Address, AbiValue::Address(addr)) => {
            let mut word = vec![0u8; 12];
            word.extend_from_slice(addr.as_bytes());
            Ok(word)
        }
        (ParamType::Uint(bits), AbiValue::Uint(n)) => {
            if n.bits() > *bits as u64 {
                return Err(AbiError::InvalidEncoding(format!(
                    "value {n} overflows uint{bits}"
                )));
            }
            Ok(uint_word(n)?.to_vec())
        }
        (ParamType::Bool, AbiValue::Bool(b)) => {
            let mut word = vec![0u8; 32];
            word[31] = u8::from(*b);
            Ok(word)
        }
        (ParamType::FixedBytes(size), AbiValue::FixedBytes(bytes)) => {
            if bytes.len() != *size {
                return Err(mismatch());
            }
            Ok(pad_right(bytes))
        }
        (ParamType::Bytes, AbiValue::Bytes(bytes)) => {
            let mut out = uint_word(&BigUint::from(bytes.len()))?.to_vec();
            out.extend(pad_right(bytes));
            Ok(out)
        }
        (ParamType::String, AbiValue::String(s)) => {
            let mut out = uint_word(&BigUint::from(s.len()))?.to_vec();
            out.extend(pad_right(s.as_bytes()));
            Ok(out)
        }
        (ParamType::Array(inner), AbiValue::Array(items)) => {
            let mut out = uint_word(&BigUint::from(items.len()))?.to_vec();
            let params = vec![(**inner).clone(); items.len()];
            out.extend(encode_values(&params, items)?);
            Ok(out)
        }
        (ParamType::FixedArray(inner, len), AbiValue::Array(items)) => {
            if items.len() != *len {
                return Err(mismatch());
            }
            let params = vec![(**inner).clone(); *len];
            encode_values(&params, items)
        }
        (ParamType::Tuple(members), AbiValue::Tuple(items)) => encode_values(members, items),
        (ParamType::Int(_), _) => Err(AbiError::UnsupportedType(canonical_param(param))),
        _ => Err(mismatch()),
    }
}

fn uint_word(n: &BigUint) -> Result<[u8; 32], AbiError> {
    let bytes = n.to_bytes_be();
    if bytes.len() > 32 {
        return Err(AbiError::InvalidEncoding(format!("value {n} overflows uint256")));
    }
    let mut word = [0u8; 32];
    word[32 - bytes.len()..].copy_from_slice(&bytes);
    Ok(word)
}

fn pad_right(bytes: &[u8]) -> Vec<u8> {
    let padded_len = bytes.len().div_ceil(32) * 32;
    let mut out = bytes.to_vec();
    out.resize(padded_len, 0);
    out
}

/// Decode call data produced for `sig`, checking the selector.
pub fn decode_call(sig: &FunctionSignature, calldata: &[u8]) -> Result<Vec<AbiValue>, AbiError> {
    if calldata.len() < 4 {
        return Err(AbiError::DataTooShort {
            expected: 4,
            actual: calldata.len(),
        });
    }

    let actual_selector = &calldata[..4];
    if actual_selector != sig.selector {
        return Err(AbiError::SelectorMismatch {
            expected: hex::encode(sig.selector),
            actual: hex::encode(actual_selector),
        });
    }

    decode_values(&sig.params, &calldata[4..])
}

/// Decode ABI-encoded values (e.g. a call's return data).
pub fn decode_values(params: &[ParamType], data: &[u8]) -> Result<Vec<AbiValue>, AbiError> {
    let mut values = Vec::with_capacity(params.len());
    let mut offset = 0;

    for param in params {
        let value = if param.is_dynamic() {
            let tail_offset = read_u256_as_usize(data, offset)?;
            ensure_bytes(data, tail_offset, 0)?;
            decode_value_at(param, &data[tail_offset..])?
        } else {
            ensure_bytes(data, offset, param.head_size())?;
            decode_value_at(param, &data[offset..])?
        };
        values.push(value);
        offset += param.head_size();
    }

    Ok(values)
}

/// Decode a value whose encoding starts at the beginning of `data`.
fn decode_value_at(param: &ParamType, data: &[u8]) -> Result<AbiValue, AbiError> {
    match param {
        ParamType::Address => {
            ensure_bytes(data, 0, 32)?;
            let mut addr = [0u8; 20];
            addr.copy_from_slice(&data[12..32]);
            Ok(AbiValue::Address(Address(addr)))
        }
        ParamType::Uint(_) => {
            ensure_bytes(data, 0, 32)?;
            Ok(AbiValue::Uint(BigUint::from_bytes_be(&data[..32])))
        }
        ParamType::Int(_) => Err(AbiError::UnsupportedType(canonical_param(param))),
        ParamType::Bool => {
            ensure_bytes(data, 0, 32)?;
            Ok(AbiValue::Bool(data[31] != 0))
        }
        ParamType::FixedBytes(size) => {
            ensure_bytes(data, 0, 32)?;
            Ok(AbiValue::FixedBytes(data[..*size].to_vec()))
        }
        ParamType::Bytes => {
            let len = read_u256_as_usize(data, 0)?;
            ensure_bytes(data, 32, len)?;
            Ok(AbiValue::Bytes(data[32..32 + len].to_vec()))
        }
        ParamType::String => {
            let len = read_u256_as_usize(data, 0)?;
            ensure_bytes(data, 32, len)?;
            let s = std::str::from_utf8(&data[32..32 + len])
                .map_err(|e| AbiError::InvalidEncoding(format!("invalid UTF-8: {e}")))?;
            Ok(AbiValue::String(s.to_string()))
        }
        ParamType::Array(inner) => {
            let len = read_u256_as_usize(data, 0)?;
            // Every element occupies at least one head word.
            let available = data.len().saturating_sub(32) / 32;
            if len > available {
                return Err(AbiError::InvalidEncoding(format!(
                    "array length {len} exceeds the {available} words of data"
                )));
            }
            let params = vec![(**inner).clone(); len];
            Ok(AbiValue::Array(decode_values(&params, &data[32..])?))
        }
        ParamType::FixedArray(inner, len) => {
            let params = vec![(**inner).clone(); *len];
            Ok(AbiValue::Array(decode_values(&params, data)?))
        }
        ParamType::Tuple(members) => Ok(AbiValue::Tuple(decode_values(members, data)?)),
    }
}

fn read_u256_as_usize(data: &[u8], offset: usize) -> Result<usize, AbiError> {
    ensure_bytes(data, offset, 32)?;
    let word = &data[offset..offset + 32];
    if word[..24].iter().any(|&b| b != 0) {
        return Err(AbiError::InvalidEncoding("offset too large for usize".to_string()));
    }
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&word[24..32]);
    usize::try_from(u64::from_be_bytes(bytes))
        .map_err(|_| AbiError::InvalidEncoding("offset too large for usize".to_string()))
}

fn ensure_bytes(data: &[u8], offset: usize, len: usize) -> Result<(), AbiError> {
    let end = offset
        .checked_add(len)
        .ok_or_else(|| AbiError::InvalidEncoding("length overflow".to_string()))?;
    if end > data.len() {
        Err(AbiError::DataTooShort {
            expected: end,
            actual: data.len(),
        })
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(n: u64) -> [u8; 32] {
        let mut w = [0u8; 32];
        w[24..].copy_from_slice(&n.to_be_bytes());
        w
    }

    #[test]
    fn test_parse_simple_signature() {
        let sig = parse_signature("getRate(address,address,address)").unwrap();
        assert_eq!(sig.name, "getRate");
        assert_eq!(sig.params, vec![ParamType::Address; 3]);
        assert_eq!(sig.canonical, "getRate(address,address,address)");
    }

    #[test]
    fn test_parse_no_params() {
        let sig = parse_signature("decimals()").unwrap();
        assert_eq!(sig.name, "decimals");
        assert!(sig.params.is_empty());
    }

    #[test]
    fn test_parse_tuple_and_arrays() {
        let sig = parse_signature("foo((address,uint256),bool,uint256[],address[3])").unwrap();
        assert_eq!(
            sig.params[0],
            ParamType::Tuple(vec![ParamType::Address, ParamType::Uint(256)])
        );
        assert_eq!(sig.params[1], ParamType::Bool);
        assert_eq!(sig.params[2], ParamType::Array(Box::new(ParamType::Uint(256))));
        assert_eq!(
            sig.params[3],
            ParamType::FixedArray(Box::new(ParamType::Address), 3)
        );
    }

    #[test]
    fn test_default_uint_width_and_canonical() {
        let sig = parse_signature("f(uint, int)").unwrap();
        assert_eq!(sig.params, vec![ParamType::Uint(256), ParamType::Int(256)]);
        assert_eq!(sig.canonical, "f(uint256,int256)");
    }

    #[test]
    fn test_invalid_signatures() {
        assert!(parse_signature("transfer").is_err());
        assert!(parse_signature("(address)").is_err());
        assert!(parse_signature("f(uint7)").is_err());
        assert!(parse_signature("f(bytes33)").is_err());
        assert!(parse_signature("f(foo)").is_err());
    }

    #[test]
    fn test_selector_computation() {
        // transfer(address,uint256) selector = 0xa9059cbb
        let sig = parse_signature("transfer(address,uint256)").unwrap();
        assert_eq!(hex::encode(sig.selector), "a9059cbb");
        // approve(address,uint256) selector = 0x095ea7b3
        assert_eq!(hex::encode(selector_from_signature("approve(address,uint256)")), "095ea7b3");
    }

    #[test]
    fn test_encode_static_call() {
        let sig = parse_signature("transfer(address,uint256)").unwrap();
        let mut to = [0u8; 20];
        to[19] = 1;
        let calldata = encode_call(
            &sig,
            &[AbiValue::Address(Address(to)), AbiValue::Uint(BigUint::from(1000u32))],
        )
        .unwrap();

        assert_eq!(calldata.len(), 4 + 64);
        assert_eq!(&calldata[..4], &[0xa9, 0x05, 0x9c, 0xbb]);
        assert_eq!(calldata[4 + 31], 1);
        assert_eq!(&calldata[36..68], &word(1000));
    }

    #[test]
    fn test_encode_dynamic_string_layout() {
        let params = vec![ParamType::String, ParamType::Bool];
        let encoded = encode_values(
            &params,
            &[AbiValue::String("Pangolin".to_string()), AbiValue::Bool(true)],
        )
        .unwrap();

        // head: offset(64), bool; tail: len(8), padded bytes
        assert_eq!(encoded.len(), 32 * 4);
        assert_eq!(&encoded[..32], &word(64));
        assert_eq!(encoded[63], 1);
        assert_eq!(&encoded[64..96], &word(8));
        assert_eq!(&encoded[96..104], b"Pangolin");
        assert!(encoded[104..128].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_encode_type_mismatch_reports_index() {
        let sig = parse_signature("f(address,uint256)").unwrap();
        let err = encode_call(
            &sig,
            &[AbiValue::Address(Address::ZERO), AbiValue::Bool(true)],
        )
        .unwrap_err();
        match err {
            AbiError::ArgumentType { index, expected } => {
                assert_eq!(index, 1);
                assert_eq!(expected, "uint256");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_encode_uint_overflow() {
        let params = vec![ParamType::Uint(8)];
        let result = encode_values(&params, &[AbiValue::Uint(BigUint::from(256u32))]);
        assert!(matches!(result, Err(AbiError::InvalidEncoding(_))));
    }

    #[test]
    fn test_decode_get_rate_output() {
        let mut data = Vec::new();
        data.extend_from_slice(&word(500));
        data.extend_from_slice(&word(7));
        let values = decode_values(&[ParamType::Uint(256), ParamType::Uint(256)], &data).unwrap();
        assert_eq!(values[0].as_uint(), Some(&BigUint::from(500u32)));
        assert_eq!(values[1].as_uint(), Some(&BigUint::from(7u32)));
    }

    #[test]
    fn test_decode_call_with_dynamic_members() {
        let sig = parse_signature("swap(string,address,uint256[],bool)").unwrap();
        let args = vec![
            AbiValue::String("SaucerSwapV2".to_string()),
            AbiValue::Address(Address::NO_CONNECTOR),
            AbiValue::Array(vec![
                AbiValue::Uint(BigUint::from(1u32)),
                AbiValue::Uint(BigUint::from(2u32)),
            ]),
            AbiValue::Bool(false),
        ];
        let calldata = encode_call(&sig, &args).unwrap();
        let decoded = decode_call(&sig, &calldata).unwrap();
        assert_eq!(decoded, args);
    }

    #[test]
    fn test_selector_mismatch() {
        let sig = parse_signature("transfer(address,uint256)").unwrap();
        let calldata = [0u8; 68];
        assert!(matches!(
            decode_call(&sig, &calldata),
            Err(AbiError::SelectorMismatch { .. })
        ));
    }

    #[test]
    fn test_decode_truncated_data() {
        let result = decode_values(&[ParamType::Uint(256), ParamType::Uint(256)], &word(1));
        assert!(matches!(result, Err(AbiError::DataTooShort { .. })));
    }

    #[test]
    fn test_array_length_beyond_data_is_rejected() {
        let array = ParamType::Array(Box::new(ParamType::Uint(256)));
        let mut data = word(32).to_vec();
        data.extend_from_slice(&word(u64::MAX));
        data.extend_from_slice(&word(7));
        let result = decode_values(&[array.clone()], &data);
        assert!(matches!(result, Err(AbiError::InvalidEncoding(_))));

        let mut data = word(32).to_vec();
        data.extend_from_slice(&word(1));
        data.extend_from_slice(&word(7));
        let values = decode_values(&[array], &data).unwrap();
        assert_eq!(
            values,
            vec![AbiValue::Array(vec![AbiValue::Uint(BigUint::from(7u32))])]
        );
    }

    #[test]
    fn test_function_call_arity() {
        let result = FunctionCall::new("f(address,uint256)", vec![AbiValue::Bool(true)]);
        assert!(matches!(
            result,
            Err(AbiError::ArgumentCount { expected: 2, actual: 1 })
        ));
    }
}
