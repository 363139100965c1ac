//! The untrusted call boundary and its revm implementation.

use std::sync::Arc;

use revm::{
    primitives::{
        AccountInfo, Address, Bytes, ExecutionResult, HaltReason, Output, TxKind, U256,
    },
    db::CacheDB,
    Evm, InMemoryDB,
};
use thiserror::Error;

use crate::types::trade_info::decode_revert_reason;

/// Gas limit for the deployment transaction.
pub const GAS_LIMIT_DEPLOY: u64 = 10_000_000;

const CALLER_ADDRESS: Address = Address::new([
    0x20, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x02,
]);

/// Why a single call into strategy code did not produce return data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallFault {
    #[error("{}", decode_revert_reason(.0))]
    Reverted(Vec<u8>),

    #[error("halted: {0}")]
    Halted(String),

    #[error("out of gas")]
    OutOfGas,

    #[error("host error: {0}")]
    Host(String),
}

/// Deployed strategy code: one capability, call with calldata and a gas limit.
///
/// `call` runs against the code as deployed and keeps no writes. Stateful
/// execution goes through an instance from [`StrategyProgram::instantiate`].
pub trait StrategyProgram: Send + Sync {
    fn call(&self, calldata: &[u8], gas_limit: u64) -> Result<Vec<u8>, CallFault>;

    /// A private storage overlay over the deployed code. Writes made by one
    /// call are seen by later calls on the same instance and by no other.
    fn instantiate(&self) -> Box<dyn ProgramInstance + '_> {
        Box::new(Stateless(self))
    }
}

impl<P: StrategyProgram + ?Sized> StrategyProgram for Arc<P> {
    fn call(&self, calldata: &[u8], gas_limit: u64) -> Result<Vec<u8>, CallFault> {
        (**self).call(calldata, gas_limit)
    }

    fn instantiate(&self) -> Box<dyn ProgramInstance + '_> {
        (**self).instantiate()
    }
}

/// One live copy of a program, owned by a single pool for one trial.
pub trait ProgramInstance: Send {
    fn call(&mut self, calldata: &[u8], gas_limit: u64) -> Result<Vec<u8>, CallFault>;
}

/// Instance for programs without storage: forwards every call.
struct Stateless<'p, P: ?Sized>(&'p P);

impl<P: StrategyProgram + ?Sized> ProgramInstance for Stateless<'_, P> {
    fn call(&mut self, calldata: &[u8], gas_limit: u64) -> Result<Vec<u8>, CallFault> {
        self.0.call(calldata, gas_limit)
    }
}

/// Strategy bytecode deployed into an in-memory revm database.
///
/// The database is frozen after deployment. Instances layer a `CacheDB`
/// over it and commit into that layer.
pub struct EvmProgram {
    db: InMemoryDB,
    address: Address,
}

impl EvmProgram {
    /// Run the creation code and keep the resulting contract.
    pub fn deploy(creation_code: &[u8]) -> Result<Self, String> {
        let mut db = InMemoryDB::default();

        let caller_info = AccountInfo {
            balance: U256::from(1_000_000_000_000_000_000_000u128),
            nonce: 0,
            code_hash: Default::default(),
            code: None,
        };
        db.insert_account_info(CALLER_ADDRESS, caller_info);

        let result = {
            let mut evm = Evm::builder()
                .with_db(&mut db)
                .modify_tx_env(|tx| {
                    tx.caller = CALLER_ADDRESS;
                    tx.transact_to = TxKind::Create;
                    tx.data = Bytes::copy_from_slice(creation_code);
                    tx.value = U256::ZERO;
                    tx.gas_limit = GAS_LIMIT_DEPLOY;
                })
                .build();

            evm.transact_commit().map_err(|e| format!("{:?}", e))?
        };

        let address = match result {
            ExecutionResult::Success { output, .. } => match output {
                Output::Create(_, Some(address)) => address,
                Output::Create(_, None) => return Err("no contract address created".into()),
                Output::Call(_) => return Err("expected create output".into()),
            },
            ExecutionResult::Revert { output, .. } => {
                return Err(decode_revert_reason(&output));
            }
            ExecutionResult::Halt { reason, .. } => {
                return Err(format!("halted: {:?}", reason));
            }
        };

        Ok(Self { db, address })
    }

    pub fn address(&self) -> Address {
        self.address
    }
}

impl StrategyProgram for EvmProgram {
    fn call(&self, calldata: &[u8], gas_limit: u64) -> Result<Vec<u8>, CallFault> {
        let mut evm = Evm::builder()
            .with_ref_db(&self.db)
            .modify_tx_env(|tx| {
                tx.caller = CALLER_ADDRESS;
                tx.transact_to = TxKind::Call(self.address);
                tx.data = Bytes::copy_from_slice(calldata);
                tx.value = U256::ZERO;
                tx.gas_limit = gas_limit;
            })
            .build();

        // transact() without commit: writes die with the EVM instance
        let outcome = evm
            .transact()
            .map_err(|e| CallFault::Host(format!("{:?}", e)))?;
        call_output(outcome.result)
    }

    fn instantiate(&self) -> Box<dyn ProgramInstance + '_> {
        Box::new(EvmInstance {
            db: CacheDB::new(&self.db),
            address: self.address,
        })
    }
}

/// Deployed contract plus the storage it has written so far.
struct EvmInstance<'p> {
    db: CacheDB<&'p InMemoryDB>,
    address: Address,
}

impl ProgramInstance for EvmInstance<'_> {
    fn call(&mut self, calldata: &[u8], gas_limit: u64) -> Result<Vec<u8>, CallFault> {
        let address = self.address;
        let mut evm = Evm::builder()
            .with_db(&mut self.db)
            .modify_tx_env(|tx| {
                tx.caller = CALLER_ADDRESS;
                tx.transact_to = TxKind::Call(address);
                tx.data = Bytes::copy_from_slice(calldata);
                tx.value = U256::ZERO;
                tx.gas_limit = gas_limit;
            })
            .build();

        let result = evm
            .transact_commit()
            .map_err(|e| CallFault::Host(format!("{:?}", e)))?;
        call_output(result)
    }
}

fn call_output(result: ExecutionResult) -> Result<Vec<u8>, CallFault> {
    match result {
        ExecutionResult::Success { output, .. } => match output {
            Output::Call(data) => Ok(data.to_vec()),
            Output::Create(..) => Err(CallFault::Host("unexpected create output".into())),
        },
        ExecutionResult::Revert { output, .. } => Err(CallFault::Reverted(output.to_vec())),
        ExecutionResult::Halt { reason, .. } => {
            if matches!(reason, HaltReason::OutOfGas(_)) {
                Err(CallFault::OutOfGas)
            } else {
                Err(CallFault::Halted(format!("{:?}", reason)))
            }
        }
    }
}
