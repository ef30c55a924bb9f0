use std::{io::Write, sync::Arc};

use backend::HttpBackend;
use color_eyre::Result;
use dashboard::DeviceDashboard;
use protocols::http::mk_hyper_http_client;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::{
    settings::read_settings,
    terminal::{render, Input, Reply, USAGE},
};

mod backend;
mod dashboard;
mod device;
mod protocols;
mod settings;
mod terminal;

fn redraw(dashboard: &DeviceDashboard, message: Option<&str>) -> Result<()> {
    let mut stdout = std::io::stdout().lock();

    // Clear the screen and move the cursor home
    write!(stdout, "\x1b[2J\x1b[H{}\n", render(&dashboard.view()))?;
    if let Some(message) = message {
        writeln!(stdout, "{}", message)?;
    }
    write!(stdout, "{}\n> ", USAGE)?;
    stdout.flush()?;

    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;
    pretty_env_logger::init();

    let settings = read_settings()?;
    let http_client = mk_hyper_http_client()?;
    let backend = HttpBackend::new(http_client, &settings.backend.url)?;

    log::info!("Polling {} every {}ms", settings.backend.url, settings.dashboard.poll_interval_ms);

    let dashboard = DeviceDashboard::mount(Arc::new(backend), &settings.dashboard);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let mut message: Option<String> = None;

    redraw(&dashboard, None)?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = dashboard.redraw_requested() => redraw(&dashboard, message.as_deref())?,
            line = lines.next_line(), if stdin_open => {
                let Some(line) = line? else {
                    // Keep displaying until ctrl-c
                    stdin_open = false;
                    continue;
                };

                if line.trim().is_empty() {
                    continue;
                }

                let reply = match Input::parse(&line) {
                    Ok(input) => input.apply(&dashboard).await,
                    Err(e) => Err(e),
                };

                match reply {
                    Ok(Reply::Continue) => message = None,
                    Ok(Reply::Message(text)) => message = Some(text),
                    Ok(Reply::Quit) => break,
                    Err(e) => {
                        log::error!("{}", e);
                        message = Some(e.to_string());
                    }
                }

                redraw(&dashboard, message.as_deref())?;
            }
        }
    }

    dashboard.unmount();

    Ok(())
}
