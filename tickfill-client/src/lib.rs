mod config;
mod gaps;
mod output;
mod recovery;
mod store;
mod transport;

pub use config::*;
pub use gaps::*;
pub use output::*;
pub use recovery::*;
pub use store::*;
pub use transport::*;
