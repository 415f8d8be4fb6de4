pub mod cache;
pub mod client;

/// Default user agent for `simplewatch` - automatically uses the package version
///
/// Can be overridden via the `SIMPLEWATCH_USER_AGENT` environment variable, see
/// [`client::effective_user_agent`].
pub const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Environment variable that overrides [`USER_AGENT`]
pub const USER_AGENT_ENV: &str = "SIMPLEWATCH_USER_AGENT";
