// Chain path and block nodes, the ledger maps, and the checks run over them.
pub mod chain;
pub mod state;
pub mod validation;

pub use chain::*;
pub use state::*;
pub use validation::*;
