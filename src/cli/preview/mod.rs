//! `observable preview`: development server with live reload.

mod error;
mod lifecycle;
mod response;
mod router;

use std::sync::Arc;

use anyhow::{Context, Result};
use crossbeam::channel;
use tiny_http::{Request, Server};

use response::{Method, PreviewRequest};
use router::Router;

use crate::cli::PreviewArgs;
use crate::config::SiteConfig;
use crate::core::{is_shutdown, register_server};
use crate::reload::ReloadServer;
use crate::{debug, log, logger};

/// Run the preview server until Ctrl+C.
pub fn run(args: &PreviewArgs) -> Result<()> {
    let config = Arc::new(SiteConfig::load(args)?);
    let hostname = config.preview.hostname.clone();

    let (server, addr) = lifecycle::bind(&hostname, config.preview.port)?;
    let server = Arc::new(server);
    let reload = ReloadServer::bind(&hostname, config.preview.ws_port)?;
    let ws_port = reload.port();
    debug!("socket"; "ws://{}:{}", hostname, ws_port);

    let (shutdown_tx, shutdown_rx) = channel::unbounded::<()>();
    register_server(Arc::clone(&server), shutdown_tx);

    let url = format!("http://{addr}/");
    logger::banner(&url);
    if config.preview.open {
        lifecycle::open_browser(&url);
    }

    let reload_handle = reload.spawn(Arc::clone(&config), shutdown_rx);
    run_request_loop(&server, Router::new(config, ws_port))?;
    lifecycle::wait_for_shutdown(reload_handle);
    Ok(())
}

fn run_request_loop(server: &Server, router: Router) -> Result<()> {
    // Renders and data loaders can be slow; keep other requests moving.
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(4)
        .build()
        .context("failed to create thread pool")?;
    let router = Arc::new(router);

    for request in server.incoming_requests() {
        let router = Arc::clone(&router);
        pool.spawn(move || {
            if let Err(e) = respond(request, &router) {
                log!("preview"; "request error: {e}");
            }
        });
    }
    Ok(())
}

fn respond(request: Request, router: &Router) -> Result<()> {
    if is_shutdown() {
        let response = response::plain(503, "Service Unavailable");
        return request.respond(response.into_tiny()).map_err(Into::into);
    }

    debug!("preview"; "{} {}", request.method(), request.url());
    let preview = PreviewRequest {
        method: match request.method() {
            tiny_http::Method::Get => Method::Get,
            tiny_http::Method::Head => Method::Head,
            _ => Method::Other,
        },
        url: request.url().to_string(),
        if_none_match: request
            .headers()
            .iter()
            .find(|h| h.field.as_str().as_str().eq_ignore_ascii_case("if-none-match"))
            .map(|h| h.value.to_string()),
    };

    let response = router.handle(&preview);
    request.respond(response.into_tiny())?;
    Ok(())
}
