pub mod request;
pub mod result;

pub use request::{SelectionQuery, StatusQuery};
pub use result::{EndpointResult, ResultStatus, BODY_READ_ERROR_CODE, TRANSPORT_ERROR_CODE};
