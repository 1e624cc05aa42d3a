pub mod client;
pub mod target;

pub use crate::client::Requester;
pub use crate::target::Target;
