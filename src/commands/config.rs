use anyhow::Result;

use crate::config::Settings;
use crate::paths;
use crate::ui;

pub fn run(settings: &Settings) -> Result<()> {
    ui::header("Configuration");

    println!();
    ui::kv("Config directory", &paths::config_dir()?.display().to_string());
    match &settings.source {
        Some(path) => ui::kv("Settings file", &path.display().to_string()),
        None => ui::kv("Settings file", "none (using defaults)"),
    }

    ui::section("Classifier");
    ui::kv("Hostname", &settings.hostname);
    ui::kv("Classifier port", &settings.classifier_port.to_string());
    ui::kv("Puppet port", &settings.puppet_port.to_string());
    ui::kv(
        "Wait timeout",
        &format!("{}s", settings.wait_timeout.as_secs()),
    );

    ui::section("Certificates");
    ui::kv("SSL directory", &settings.ssl_dir.display().to_string());
    ui::kv("CA certificate", &settings.tls.ca_cert.display().to_string());
    ui::kv("Certificate", &settings.tls.cert.display().to_string());
    ui::kv("Private key", &settings.tls.private_key.display().to_string());

    ui::section("Code deployment");
    ui::kv("Deploy command", &settings.deploy_command);
    ui::kv("Settle time", &format!("{}s", settings.settle.as_secs()));

    println!();
    ui::dim("Flags and NCEDIT_* environment variables override the settings file.");
    Ok(())
}
