mod packet;
mod request;

pub use packet::*;
pub use request::*;
