pub mod poller;

pub use poller::{PollSummary, Poller, DEFAULT_POLL_INTERVAL};
