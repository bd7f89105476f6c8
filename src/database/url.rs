//! Connection URL resolution
//!
//! Bundles configure their database either with one URL variable or with the separate
//! host/port/name/user/password variables the packaged applications use natively.

use url::Url;

use crate::config::{DatabaseProfile, Driver, Environment};
use crate::error::{ProvisionError, Result, database, profile};

/// Build the connection URL from the environment
pub fn resolve_url(profile: &DatabaseProfile, env: &Environment) -> Result<String> {
    if let Some(url_env) = &profile.url_env {
        if let Some(url) = env.get(url_env) {
            return Ok(url.to_string());
        }
        if profile.driver.is_none() {
            return Err(ProvisionError::ConfigVariableMissing {
                variable: url_env.clone(),
            });
        }
    }

    let Some(driver) = profile.driver else {
        return Err(profile::invalid(
            "database needs either url_env or driver with host/name/user variables",
        ));
    };
    if driver == Driver::Sqlite {
        return Err(profile::invalid("sqlite databases must be configured with url_env"));
    }

    let host = require_part(env, profile.host_env.as_deref(), "host_env")?;
    let name = require_part(env, profile.name_env.as_deref(), "name_env")?;
    let user = require_part(env, profile.user_env.as_deref(), "user_env")?;

    let mut url = Url::parse(&format!("{}://{}", driver.scheme(), host))
        .map_err(|e| database::error(format!("invalid database host '{host}': {e}")))?;

    if let Some(port_env) = &profile.port_env {
        if let Some(port) = env.get(port_env) {
            let port: u16 = port
                .parse()
                .map_err(|_| database::error(format!("invalid database port '{port}'")))?;
            url.set_port(Some(port))
                .map_err(|()| database::error("database URL cannot carry a port"))?;
        }
    }

    url.set_username(user)
        .map_err(|()| database::error("database URL cannot carry a username"))?;
    if let Some(password) = profile.password_env.as_deref().and_then(|v| env.get(v)) {
        url.set_password(Some(password))
            .map_err(|()| database::error("database URL cannot carry a password"))?;
    }
    url.set_path(&format!("/{name}"));

    Ok(url.to_string())
}

fn require_part<'a>(env: &'a Environment, variable: Option<&str>, field: &str) -> Result<&'a str> {
    let variable =
        variable.ok_or_else(|| profile::invalid(format!("database.{field} is required")))?;
    env.require(variable)
}

/// Replace the password in a URL so it can be logged
pub fn mask_password(url: &str) -> String {
    match Url::parse(url) {
        Ok(mut parsed) if parsed.password().is_some() => {
            if parsed.set_password(Some("****")).is_ok() {
                parsed.to_string()
            } else {
                url.to_string()
            }
        }
        _ => url.to_string(),
    }
}
