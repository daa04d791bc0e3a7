pub mod inspect_cmd;
pub mod lookup_cmd;
pub mod update_cmd;
pub mod watch_cmd;

pub use inspect_cmd::cmd_inspect;
pub use lookup_cmd::{cmd_lookup, LookupArgs};
pub use update_cmd::cmd_update;
pub use watch_cmd::cmd_watch;
