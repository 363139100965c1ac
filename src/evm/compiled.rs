//! Compiler output consumed by the executor: bytecode plus declared callbacks.

use std::fmt;

use revm::primitives::{keccak256, B256};
use serde::Deserialize;

/// Content identity of a compiled strategy (keccak-256 of its bytecode).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StrategyId(B256);

impl StrategyId {
    pub fn of_bytecode(bytecode: &[u8]) -> Self {
        StrategyId(keccak256(bytecode))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0 .0
    }
}

impl fmt::Display for StrategyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Generation of the callback ABI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
pub enum CallbackVersion {
    /// Reserves and trade only
    #[display("v1")]
    V1,
    /// Adds pool id and token ids
    #[display("v2")]
    V2,
}

impl CallbackVersion {
    /// Preference order when a strategy exposes both.
    pub const PREFERENCE: [CallbackVersion; 2] = [CallbackVersion::V2, CallbackVersion::V1];

    pub const fn initialize_callback(self) -> &'static str {
        match self {
            CallbackVersion::V1 => "afterInitialize",
            CallbackVersion::V2 => "afterInitializeV2",
        }
    }

    pub const fn swap_callback(self) -> &'static str {
        match self {
            CallbackVersion::V1 => "afterSwap",
            CallbackVersion::V2 => "afterSwapV2",
        }
    }
}

/// Which callbacks a compiled strategy declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StrategyInterface {
    pub after_initialize: bool,
    pub after_initialize_v2: bool,
    pub after_swap: bool,
    pub after_swap_v2: bool,
    pub get_name: bool,
}

#[derive(Deserialize)]
struct AbiItem {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum AbiDocument {
    Items(Vec<AbiItem>),
    Artifact { abi: Vec<AbiItem> },
}

impl StrategyInterface {
    /// Every callback is attempted; used when no ABI is available.
    pub const fn assume_all() -> Self {
        Self {
            after_initialize: true,
            after_initialize_v2: true,
            after_swap: true,
            after_swap_v2: true,
            get_name: true,
        }
    }

    /// Declare whole callback generations at once.
    pub const fn with_callbacks(v1: bool, v2: bool) -> Self {
        Self {
            after_initialize: v1,
            after_initialize_v2: v2,
            after_swap: v1,
            after_swap_v2: v2,
            get_name: true,
        }
    }

    /// Read the declared functions from a compiler ABI.
    ///
    /// Accepts either the bare ABI array or an artifact object with an
    /// `abi` field.
    pub fn from_abi_json(json: &str) -> Result<Self, serde_json::Error> {
        let items = match serde_json::from_str::<AbiDocument>(json)? {
            AbiDocument::Items(items) => items,
            AbiDocument::Artifact { abi } => abi,
        };

        let mut interface = Self::default();
        for item in items.iter().filter(|item| item.kind == "function") {
            match item.name.as_deref() {
                Some("afterInitialize") => interface.after_initialize = true,
                Some("afterInitializeV2") => interface.after_initialize_v2 = true,
                Some("afterSwap") => interface.after_swap = true,
                Some("afterSwapV2") => interface.after_swap_v2 = true,
                Some("getName") => interface.get_name = true,
                _ => {}
            }
        }
        Ok(interface)
    }

    #[inline]
    pub fn supports_initialize(&self, version: CallbackVersion) -> bool {
        match version {
            CallbackVersion::V1 => self.after_initialize,
            CallbackVersion::V2 => self.after_initialize_v2,
        }
    }

    #[inline]
    pub fn supports_swap(&self, version: CallbackVersion) -> bool {
        match version {
            CallbackVersion::V1 => self.after_swap,
            CallbackVersion::V2 => self.after_swap_v2,
        }
    }
}

/// Creation bytecode plus its declared interface.
#[derive(Debug, Clone)]
pub struct CompiledStrategy {
    pub bytecode: Vec<u8>,
    pub interface: StrategyInterface,
}

impl CompiledStrategy {
    pub fn new(bytecode: Vec<u8>, interface: StrategyInterface) -> Self {
        Self { bytecode, interface }
    }

    pub fn id(&self) -> StrategyId {
        StrategyId::of_bytecode(&self.bytecode)
    }
}
