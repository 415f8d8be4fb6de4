// Client creation with custom user-agent support for kube 2.x
use super::{USER_AGENT, USER_AGENT_ENV};
use crate::error::Result;
use hyper::http::{HeaderName, HeaderValue};
use kube::{Client, Config};
use tracing::warn;

/// User agent to send: `SIMPLEWATCH_USER_AGENT` when set, otherwise `custom` or the default
#[must_use]
pub fn effective_user_agent(custom: Option<&str>) -> String {
    std::env::var(USER_AGENT_ENV)
        .ok()
        .filter(|ua| !ua.trim().is_empty())
        .or_else(|| custom.map(str::to_string))
        .unwrap_or_else(|| USER_AGENT.to_string())
}

/// Add a user-agent header to `config`, logging and skipping invalid values
pub fn add_user_agent_header(config: &mut Config, user_agent: &str) {
    match HeaderValue::from_str(user_agent) {
        Ok(header_value) => {
            config
                .headers
                .push((HeaderName::from_static("user-agent"), header_value));
        }
        Err(e) => warn!("Invalid user agent {:?} ignored: {}", user_agent, e),
    }
}

/// Add a user-agent header to `config`, rejecting invalid values
///
/// # Errors
///
/// Will return `Err` when `user_agent` is not a valid header value
pub fn try_add_user_agent_header(config: &mut Config, user_agent: &str) -> Result<()> {
    let header_value = HeaderValue::from_str(user_agent).map_err(hyper::http::Error::from)?;
    config
        .headers
        .push((HeaderName::from_static("user-agent"), header_value));
    Ok(())
}

/// Create a new k8s client to interact with k8s cluster api
///
/// # Errors
///
/// Will return `Err` if the kube configuration cannot be inferred or the client cannot be built
pub async fn new(custom_user_agent: Option<&str>) -> Result<Client> {
    let mut config = Config::infer().await?;
    add_user_agent_header(&mut config, &effective_user_agent(custom_user_agent));

    Ok(Client::try_from(config)?)
}

/// Like [`new`], but an invalid user agent is an error instead of a warning
///
/// # Errors
///
/// Will return `Err` for an invalid user agent or if the client cannot be built
pub async fn new_strict(custom_user_agent: Option<&str>) -> Result<Client> {
    let mut config = Config::infer().await?;
    try_add_user_agent_header(&mut config, &effective_user_agent(custom_user_agent))?;

    Ok(Client::try_from(config)?)
}
