pub mod error;
pub mod extract;
pub mod feedback_handlers;
pub mod handlers;
pub mod routes;
pub mod user_extractor;

pub use error::*;
pub use extract::*;
pub use feedback_handlers::*;
pub use handlers::*;
pub use routes::*;
pub use user_extractor::*;
