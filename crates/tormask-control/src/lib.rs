// # Tor Control Port Client
//
// This crate provides the control-port side of identity rotation for tormask.
//
// ## Components
//
// - `FileCookieStore`: reads the daemon's auth cookie from a list of candidate paths
// - `ControlSession`: one short-lived connection per rotation
//   (AUTHENTICATE, SIGNAL, QUIT)
// - `reply`: reply framing for the control protocol
//
// ## Exchange
//
// ```text
// -> AUTHENTICATE <cookie as lowercase hex>\r\n
// -> SIGNAL NEWNYM\r\n
// -> QUIT\r\n
// <- 250 OK\r\n            (or 515 Authentication failed)
// <- 250 OK\r\n            (or 552 Unrecognized signal)
// <- 250 closing connection\r\n
// ```
//
// All three commands are written at once; the daemon answers them in order.
//
// ## Security
//
// - The cookie and its hex form never appear in logs or Debug output
// - The cookie is re-read for every rotation and dropped afterwards

pub mod cookie;
pub mod reply;
pub mod session;

pub use cookie::FileCookieStore;
pub use reply::{Reply, ReplyReader};
pub use session::ControlSession;

use tormask_core::config::ControlConfig;

/// Build the cookie store and control session described by `config`
pub fn from_config(config: &ControlConfig) -> (FileCookieStore, ControlSession) {
    (
        FileCookieStore::new(config.cookie_paths.iter()),
        ControlSession::from_config(config),
    )
}
