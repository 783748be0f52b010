pub mod classify;
pub mod clock;
pub mod transport;

pub use classify::{classify, evaluate};
pub use clock::{Clock, ManualClock, SystemClock};
pub use transport::{HttpResponse, HttpTransport, ReqwestTransport, TransportError};
