//! Reverse proxy site configuration

use crate::deploy::fsm::Stage;
use crate::errors::DeployError;
use crate::logs::RunLog;
use crate::process::CommandRunner;
use crate::remote::ssh::{run_steps, RemoteStep, SshTarget};

/// Placeholder replaced with the application port
pub const PORT_PLACEHOLDER: &str = "__APP_PORT__";

/// Where the site definition is written
pub const SITE_AVAILABLE: &str = "/etc/nginx/sites-available/app";

/// Where the site definition is activated
pub const SITE_ENABLED: &str = "/etc/nginx/sites-enabled/app";

/// Site shipped by the distribution package, which would shadow ours on port 80
pub const DEFAULT_SITE_ENABLED: &str = "/etc/nginx/sites-enabled/default";

/// nginx server block fronting the application on port 80
pub const SITE_TEMPLATE: &str = r#"server {
    listen 80;
    server_name _;

    location / {
        proxy_pass http://localhost:__APP_PORT__;
        proxy_http_version 1.1;
        proxy_set_header Host $host;
        proxy_set_header X-Real-IP $remote_addr;
        proxy_set_header X-Forwarded-For $proxy_add_x_forwarded_for;
        proxy_set_header X-Forwarded-Proto $scheme;
    }
}
"#;

/// Render the site definition for `app_port`
///
/// Plain textual substitution of every placeholder occurrence.
pub fn render_site(app_port: u16) -> String {
    SITE_TEMPLATE.replace(PORT_PLACEHOLDER, &app_port.to_string())
}

/// Steps that install, activate and load the site definition
///
/// `nginx -t` runs before the reload, so a broken definition stops the
/// sequence before nginx picks it up.
pub fn proxy_steps(app_port: u16) -> Vec<RemoteStep> {
    let port = app_port.to_string();
    vec![
        RemoteStep::new(
            "Writing site definition",
            format!("sudo tee {} > /dev/null", SITE_AVAILABLE),
        )
        .with_stdin(render_site(app_port)),
        RemoteStep::new(
            "Verifying site definition",
            format!(
                "! grep -q {placeholder} {site} && grep -q \"localhost:$APP_PORT;\" {site}",
                placeholder = PORT_PLACEHOLDER,
                site = SITE_AVAILABLE
            ),
        )
        .with_env("APP_PORT", port),
        RemoteStep::new(
            "Activating site",
            format!("sudo ln -sf {} {}", SITE_AVAILABLE, SITE_ENABLED),
        ),
        RemoteStep::new(
            "Disabling default site",
            format!("sudo rm -f {}", DEFAULT_SITE_ENABLED),
        )
        .tolerated(),
        RemoteStep::new("Validating nginx configuration", "sudo nginx -t"),
        RemoteStep::new("Reloading nginx", "sudo systemctl reload nginx"),
    ]
}

/// Point the reverse proxy at the application port
pub async fn configure_proxy(
    runner: &dyn CommandRunner,
    target: &SshTarget,
    app_port: u16,
    log: &RunLog,
) -> Result<(), DeployError> {
    run_steps(
        runner,
        target,
        Stage::ProxyConfiguration,
        &proxy_steps(app_port),
        log,
    )
    .await?;
    log.info(format!("nginx now forwards port 80 to localhost:{}", app_port));
    Ok(())
}

/// Steps that deactivate the site and reload nginx
pub fn removal_steps() -> Vec<RemoteStep> {
    vec![
        RemoteStep::new("Removing site link", format!("sudo rm -f {}", SITE_ENABLED)),
        RemoteStep::new("Reloading nginx", "sudo systemctl reload nginx"),
    ]
}
