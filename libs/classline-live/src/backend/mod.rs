//! REST clients for the Classline backend services this coordinator
//! consumes: credential issuance and class status transitions.

pub mod status;
pub mod tokens;

pub use status::{ClassStatus, ClassStatusClient};
pub use tokens::{Credentials, TokenClient};
