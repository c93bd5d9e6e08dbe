//! System-wide HTTP(S) proxy routing through GNOME's `gsettings`.

use crate::{
    command::{run_checked, Invocation, Runner},
    error::{Error, Result},
};

const GSETTINGS: &str = "gsettings";
const LOOPBACK: &str = "127.0.0.1";

fn set(schema: &str, key: &str, value: &str) -> Invocation {
    Invocation::new(GSETTINGS, ["set", schema, key, value])
}

/// Settings writes performed by [`enable`], in order.
pub fn enable_commands(port: u16) -> Vec<Invocation> {
    let port = port.to_string();

    vec![
        set("org.gnome.system.proxy", "mode", "manual"),
        set("org.gnome.system.proxy.http", "host", LOOPBACK),
        set("org.gnome.system.proxy.http", "port", &port),
        set("org.gnome.system.proxy.https", "host", LOOPBACK),
        set("org.gnome.system.proxy.https", "port", &port),
    ]
}

/// Routes HTTP and HTTPS through the local listener on `port`.
///
/// Stops at the first failing write; earlier writes are not undone.
pub fn enable(runner: &dyn Runner, port: u16) -> Result<()> {
    if runner.lookup(GSETTINGS).is_none() {
        return Err(Error::UnsupportedEnvironment(
            "system proxy configuration is currently only supported on GNOME".to_string(),
        ));
    }

    for command in enable_commands(port) {
        run_checked(runner, &command)?;
    }

    log::info!("system proxy set to {}:{}", LOOPBACK, port);
    Ok(())
}

pub fn disable(runner: &dyn Runner) -> Result<()> {
    run_checked(runner, &set("org.gnome.system.proxy", "mode", "none"))?;

    log::info!("system proxy disabled");
    Ok(())
}
