pub mod batch;
pub mod classes;
pub mod config;
pub mod groups;
pub mod refresh;

use crate::Context;
use crate::config::Settings;
use crate::progress;
use crate::ui;
use anyhow::{Context as _, Result};
use classifier::{HttpClassifier, POLL_INTERVAL, wait_for_port};

/// Wait for the classifier to accept connections, then build a client
pub fn connect(ctx: &Context, settings: &Settings) -> Result<HttpClassifier> {
    let host = settings.hostname.as_str();
    let port = settings.classifier_port;

    let pb = (!ctx.quiet).then(|| progress::spinner(&format!("Waiting for classifier on {host}:{port}...")));
    let waited = wait_for_port(host, port, settings.wait_timeout, POLL_INTERVAL, |elapsed| {
        log::debug!("connection refused after {}s, waiting...", elapsed.as_secs());
        if let Some(pb) = &pb {
            pb.set_message(format!(
                "Waiting for classifier on {host}:{port}... ({}s)",
                elapsed.as_secs()
            ));
        }
    });
    match (&pb, &waited) {
        (Some(pb), Ok(_)) => progress::finish_success(pb, "Classifier signs of life detected"),
        (Some(pb), Err(e)) => progress::finish_error(pb, &e.to_string()),
        (None, _) => {}
    }
    waited?;

    HttpClassifier::new(host, port, settings.puppet_port, &settings.tls)
        .context("Could not set up the classifier client")
}

/// Report a reconciliation failure and hand it back as an `anyhow` error
pub fn fail(err: reconcile::Error) -> anyhow::Error {
    ui::report(&err);
    err.into()
}
