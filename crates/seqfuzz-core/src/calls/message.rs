//! Call messages and their ABI-encoded input.
//!
//! A [`CallMessage`] is one simulated transaction. Its input is either raw
//! bytes or a method plus argument values, encoded on demand as a 4-byte
//! selector followed by one 32-byte word per argument.
//!
//! Only static (single-word) argument types are supported; the generator
//! side never produces dynamic arrays or strings for this engine.

use std::fmt;
use std::str::FromStr;

use seqfuzz_types::encoding::{hex_bytes, to_hex_prefixed};
use seqfuzz_types::{Address, Hash32};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::errors::AbiError;

/// Size of an encoded argument word.
pub const WORD_SIZE: usize = 32;

/// Size of a method selector.
pub const SELECTOR_SIZE: usize = 4;

// =============================================================================
// ABI types
// =============================================================================

/// A static ABI parameter type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AbiType {
    /// `uintN`, N in 8..=256 step 8
    Uint(u16),
    /// `intN`, N in 8..=256 step 8
    Int(u16),
    Bool,
    Address,
    /// `bytesN`, N in 1..=32
    FixedBytes(u8),
}

impl fmt::Display for AbiType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbiType::Uint(bits) => write!(f, "uint{}", bits),
            AbiType::Int(bits) => write!(f, "int{}", bits),
            AbiType::Bool => write!(f, "bool"),
            AbiType::Address => write!(f, "address"),
            AbiType::FixedBytes(len) => write!(f, "bytes{}", len),
        }
    }
}

impl FromStr for AbiType {
    type Err = AbiError;

    fn from_str(s: &str) -> Result<Self, AbiError> {
        let invalid = || AbiError::InvalidType {
            name: s.to_string(),
        };
        let s = s.trim();
        match s {
            "bool" => return Ok(AbiType::Bool),
            "address" => return Ok(AbiType::Address),
            "uint" => return Ok(AbiType::Uint(256)),
            "int" => return Ok(AbiType::Int(256)),
            _ => {}
        }
        let int_bits = |digits: &str| -> Result<u16, AbiError> {
            let bits: u16 = digits.parse().map_err(|_| invalid())?;
            if bits == 0 || bits > 256 || bits % 8 != 0 {
                return Err(invalid());
            }
            Ok(bits)
        };
        if let Some(digits) = s.strip_prefix("uint") {
            return Ok(AbiType::Uint(int_bits(digits)?));
        }
        if let Some(digits) = s.strip_prefix("int") {
            return Ok(AbiType::Int(int_bits(digits)?));
        }
        if let Some(digits) = s.strip_prefix("bytes") {
            let len: u8 = digits.parse().map_err(|_| invalid())?;
            if len == 0 || len as usize > WORD_SIZE {
                return Err(invalid());
            }
            return Ok(AbiType::FixedBytes(len));
        }
        Err(invalid())
    }
}

/// A concrete argument value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbiValue {
    Uint(u128),
    Int(i128),
    Bool(bool),
    Address(Address),
    FixedBytes(#[serde(with = "hex_bytes")] Vec<u8>),
}

impl AbiValue {
    /// Whether this value can be encoded as `ty`.
    pub fn matches(&self, ty: &AbiType) -> bool {
        match (self, ty) {
            (AbiValue::Uint(v), AbiType::Uint(bits)) => *bits >= 128 || *v >> *bits == 0,
            (AbiValue::Int(v), AbiType::Int(bits)) => {
                if *bits >= 128 {
                    return true;
                }
                let half = 1i128 << (*bits - 1);
                *v >= -half && *v < half
            }
            (AbiValue::Bool(_), AbiType::Bool) => true,
            (AbiValue::Address(_), AbiType::Address) => true,
            (AbiValue::FixedBytes(b), AbiType::FixedBytes(len)) => b.len() == *len as usize,
            _ => false,
        }
    }

    /// Encode as a single 32-byte word.
    pub fn encode_word(&self) -> [u8; WORD_SIZE] {
        let mut word = [0u8; WORD_SIZE];
        match self {
            AbiValue::Uint(v) => word[16..].copy_from_slice(&v.to_be_bytes()),
            AbiValue::Int(v) => {
                if *v < 0 {
                    word[..16].fill(0xff);
                }
                word[16..].copy_from_slice(&v.to_be_bytes());
            }
            AbiValue::Bool(b) => word[WORD_SIZE - 1] = u8::from(*b),
            AbiValue::Address(a) => word[12..].copy_from_slice(a.as_bytes()),
            AbiValue::FixedBytes(b) => {
                let len = b.len().min(WORD_SIZE);
                word[..len].copy_from_slice(&b[..len]);
            }
        }
        word
    }
}

impl fmt::Display for AbiValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbiValue::Uint(v) => write!(f, "{}", v),
            AbiValue::Int(v) => write!(f, "{}", v),
            AbiValue::Bool(b) => write!(f, "{}", b),
            AbiValue::Address(a) => write!(f, "{}", a.to_short_string()),
            AbiValue::FixedBytes(b) => write!(f, "{}", to_hex_prefixed(b)),
        }
    }
}

// =============================================================================
// Methods
// =============================================================================

/// A contract method: name plus parameter types.
///
/// Serialized as its canonical signature string, e.g. `"deposit(uint256,address)"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AbiMethod {
    pub name: String,
    pub inputs: Vec<AbiType>,
}

impl AbiMethod {
    pub fn new(name: impl Into<String>, inputs: Vec<AbiType>) -> Self {
        Self {
            name: name.into(),
            inputs,
        }
    }

    /// Parse a signature like `transfer(address,uint256)`.
    pub fn parse(signature: &str) -> Result<Self, AbiError> {
        let invalid = |reason: &str| AbiError::InvalidSignature {
            signature: signature.to_string(),
            reason: reason.to_string(),
        };
        let sig = signature.trim();
        let open = sig.find('(').ok_or_else(|| invalid("missing '('"))?;
        let inner = sig[open + 1..]
            .strip_suffix(')')
            .ok_or_else(|| invalid("missing trailing ')'"))?;
        let name = &sig[..open];
        if name.is_empty()
            || !name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
        {
            return Err(invalid("method name must be a non-empty identifier"));
        }
        let inputs = if inner.trim().is_empty() {
            Vec::new()
        } else {
            inner
                .split(',')
                .map(AbiType::from_str)
                .collect::<Result<Vec<_>, _>>()?
        };
        Ok(Self::new(name, inputs))
    }

    /// Canonical signature, e.g. `setUp()`.
    pub fn signature(&self) -> String {
        let inputs: Vec<String> = self.inputs.iter().map(|t| t.to_string()).collect();
        format!("{}({})", self.name, inputs.join(","))
    }

    /// First 4 bytes of the SHA-256 digest of the signature.
    pub fn selector(&self) -> [u8; SELECTOR_SIZE] {
        let digest = Hash32::digest(self.signature().as_bytes());
        let mut selector = [0u8; SELECTOR_SIZE];
        selector.copy_from_slice(&digest.0[..SELECTOR_SIZE]);
        selector
    }

    /// Check `args` against the declared inputs.
    pub fn check_args(&self, args: &[AbiValue]) -> Result<(), AbiError> {
        if args.len() != self.inputs.len() {
            return Err(AbiError::ArgumentCount {
                method: self.signature(),
                expected: self.inputs.len(),
                got: args.len(),
            });
        }
        for (position, (value, ty)) in args.iter().zip(&self.inputs).enumerate() {
            if !value.matches(ty) {
                return Err(AbiError::ArgumentType {
                    method: self.signature(),
                    position,
                    expected: ty.to_string(),
                });
            }
        }
        Ok(())
    }
}

impl fmt::Display for AbiMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.signature())
    }
}

impl Serialize for AbiMethod {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.signature())
    }
}

impl<'de> Deserialize<'de> for AbiMethod {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        AbiMethod::parse(&s).map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// Call data
// =============================================================================

/// A method together with its argument values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbiCallData {
    pub method: AbiMethod,
    #[serde(default)]
    pub args: Vec<AbiValue>,
}

impl AbiCallData {
    /// Build call data, checking the arguments against the method.
    pub fn new(method: AbiMethod, args: Vec<AbiValue>) -> Result<Self, AbiError> {
        method.check_args(&args)?;
        Ok(Self { method, args })
    }

    /// Selector followed by one word per argument.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(SELECTOR_SIZE + WORD_SIZE * self.args.len());
        out.extend_from_slice(&self.method.selector());
        for arg in &self.args {
            out.extend_from_slice(&arg.encode_word());
        }
        out
    }
}

/// Transaction input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallData {
    Raw(#[serde(with = "hex_bytes")] Vec<u8>),
    Abi(AbiCallData),
}

impl CallData {
    pub fn encode(&self) -> Vec<u8> {
        match self {
            CallData::Raw(bytes) => bytes.clone(),
            CallData::Abi(abi) => abi.encode(),
        }
    }
}

impl Default for CallData {
    fn default() -> Self {
        CallData::Raw(Vec::new())
    }
}

// =============================================================================
// CallMessage
// =============================================================================

/// A single simulated transaction. Never mutated after construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallMessage {
    pub from: Address,
    /// Target contract; `None` deploys a new contract.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<Address>,
    #[serde(default)]
    pub value: u128,
    /// Zero when omitted from JSON; reproducer loading fills in the default.
    #[serde(default)]
    pub gas_limit: u64,
    #[serde(default)]
    pub data: CallData,
}

impl CallMessage {
    pub fn new(
        from: Address,
        to: Option<Address>,
        value: u128,
        gas_limit: u64,
        data: CallData,
    ) -> Self {
        Self {
            from,
            to,
            value,
            gas_limit,
            data,
        }
    }

    /// Build a call from a method and argument values.
    pub fn with_abi_values(
        from: Address,
        to: Option<Address>,
        value: u128,
        gas_limit: u64,
        method: AbiMethod,
        args: Vec<AbiValue>,
    ) -> Result<Self, AbiError> {
        let data = AbiCallData::new(method, args)?;
        Ok(Self::new(from, to, value, gas_limit, CallData::Abi(data)))
    }

    /// Encoded transaction input.
    pub fn input(&self) -> Vec<u8> {
        self.data.encode()
    }

    pub fn is_creation(&self) -> bool {
        self.to.is_none()
    }

    /// The structured method, when the input was built from one.
    pub fn abi_method(&self) -> Option<&AbiMethod> {
        match &self.data {
            CallData::Abi(abi) => Some(&abi.method),
            CallData::Raw(_) => None,
        }
    }

    /// Selector of the encoded input, if it is long enough to have one.
    pub fn selector(&self) -> Option<[u8; SELECTOR_SIZE]> {
        match &self.data {
            CallData::Abi(abi) => Some(abi.method.selector()),
            CallData::Raw(bytes) if bytes.len() >= SELECTOR_SIZE => {
                let mut selector = [0u8; SELECTOR_SIZE];
                selector.copy_from_slice(&bytes[..SELECTOR_SIZE]);
                Some(selector)
            }
            CallData::Raw(_) => None,
        }
    }

    /// Canonical byte encoding used for transaction hashing.
    pub fn to_bytes(&self) -> Vec<u8> {
        let input = self.input();
        let mut out = Vec::with_capacity(20 + 21 + 16 + 8 + input.len());
        out.extend_from_slice(self.from.as_bytes());
        match &self.to {
            Some(to) => {
                out.push(1);
                out.extend_from_slice(to.as_bytes());
            }
            None => out.push(0),
        }
        out.extend_from_slice(&self.value.to_be_bytes());
        out.extend_from_slice(&self.gas_limit.to_be_bytes());
        out.extend_from_slice(&input);
        out
    }
}

impl fmt::Display for CallMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let to = match &self.to {
            Some(to) => to.to_short_string(),
            None => "<create>".to_string(),
        };
        write!(f, "{} -> {}", self.from.to_short_string(), to)?;
        match &self.data {
            CallData::Abi(abi) => {
                let args: Vec<String> = abi.args.iter().map(|a| a.to_string()).collect();
                write!(f, ".{}({})", abi.method.name, args.join(", "))?;
            }
            CallData::Raw(bytes) if !bytes.is_empty() => {
                write!(f, " data={}", to_hex_prefixed(bytes))?;
            }
            CallData::Raw(_) => {}
        }
        if self.value > 0 {
            write!(f, " value={}", self.value)?;
        }
        Ok(())
    }
}
