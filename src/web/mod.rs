pub mod error;
pub mod responses;
pub mod router;
pub mod state;

pub use error::ApiError;
pub use responses::ApiMessage;
pub use state::AppState;
