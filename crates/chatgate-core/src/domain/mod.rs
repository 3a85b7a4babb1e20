//! Domain types - identities, windows, access lists, usage statistics and
//! the chat log.

mod blacklist;
mod chat_log;
mod identity;
mod usage;
mod window;

pub use blacklist::{AccessList, BlacklistEntry, BlacklistPolicy, Escalation, Standing};
pub use chat_log::{ChatExchange, ChatLog, ChatThread, RequestInfo, final_message};
pub use identity::{ClientIdentity, UNKNOWN_ADDRESS, resolve_address};
pub use usage::{AddressUsage, TokenUsage, UsageSnapshot, UsageStatistics, Visit};
pub use window::{Window, WindowBudgets};
