//! tally-client: the three remote collaborators (budget service,
//! categorization model, chat channel) plus the shared retry policy.

pub mod budget;
pub mod channel;
pub mod error;
pub mod model;
pub mod retry;

pub use budget::{resolve_category_id, BudgetClient};
pub use channel::ChannelClient;
pub use error::ClientError;
pub use model::ModelClient;
pub use retry::RetryPolicy;
