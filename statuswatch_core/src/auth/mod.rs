pub mod authorizer;
pub mod certificate;
pub mod subject;


pub use authorizer::{Authorizer, ClientCertInfoPolicy, ClientCertPolicy, Denial};
pub use certificate::RootVerifier;
