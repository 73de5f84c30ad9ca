//! Transaction dispatch: per-chain gates and the serialized submitter.

mod dispatcher;
mod gate;

pub use dispatcher::TxDispatcher;
pub use gate::DispatchGate;
