mod event;
mod expense;
mod ledger;
mod money;
mod participant;
mod settlement;

pub use event::*;
pub use expense::*;
pub use ledger::*;
pub use money::*;
pub use participant::*;
pub use settlement::*;
