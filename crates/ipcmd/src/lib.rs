//! Command-line core for an iproute2-compatible `ip` tool.
//!
//! Argument vectors are parsed with a token [`Cursor`](cursor::Cursor)
//! into typed commands, executed against a [`Gateway`](gateway::Gateway)
//! and rendered as text or JSON. The kernel side lives in [`netlink`];
//! [`MemoryGateway`](gateway::MemoryGateway) stands in for it in tests.
//!
//! # Example
//!
//! ```ignore
//! use ipcmd::dispatch;
//! use ipcmd::netlink::KernelGateway;
//! use ipcmd::options::{Flags, Options};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let opts = Options::from_flags(Flags::default())?;
//!     let gw = KernelGateway::from_options(&opts)?;
//!     dispatch::run(&["route", "show"], &opts, &gw, &mut std::io::stdout()).await?;
//!     Ok(())
//! }
//! ```

pub mod commands;
pub mod cursor;
pub mod dispatch;
pub mod error;
pub mod filter;
pub mod gateway;
pub mod help;
pub mod names;
pub mod netlink;
pub mod options;
pub mod output;
pub mod parse;
pub mod types;

pub use error::{Error, GatewayError, Result};
