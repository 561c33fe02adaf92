use std::net::SocketAddr;

use anyhow::Context;
use clap::Parser;
use robot_server::cli::Arguments;
use robot_server::observer::ServerObserver;
use robot_server::server::Server;
use tokio::sync::broadcast;

struct ConnectionLogger;

impl ServerObserver for ConnectionLogger {
    fn on_new_connection(&mut self, peer: std::net::SocketAddr) {
        log::info!("new connection from {peer}");
    }
}

fn init_logging(verbose: bool, log_file: Option<&std::path::Path>) -> anyhow::Result<()> {
    let encoder = Box::new(log4rs::encode::pattern::PatternEncoder::new(
        "{d(%Y-%m-%d %H:%M:%S)} {l} {t} - {m}{n}",
    ));
    let console_level = if verbose { log::LevelFilter::Debug } else { log::LevelFilter::Info };

    let mut config = log4rs::config::Config::builder().appender(
        log4rs::config::Appender::builder()
            .filter(Box::new(log4rs::filter::threshold::ThresholdFilter::new(console_level)))
            .build(
                "console",
                Box::new(log4rs::append::console::ConsoleAppender::builder().encoder(encoder.clone()).build()),
            ),
    );
    let mut appenders = vec!["console".to_string()];

    if let Some(path) = log_file {
        let file_appender = log4rs::append::file::FileAppender::builder()
            .encoder(encoder)
            .build(path)
            .with_context(|| format!("could not open log file {}", path.display()))?;
        config = config.appender(
            log4rs::config::Appender::builder()
                .filter(Box::new(log4rs::filter::threshold::ThresholdFilter::new(log::LevelFilter::Info)))
                .build("file", Box::new(file_appender)),
        );
        appenders.push("file".to_string());
    }

    let config = config
        .build(log4rs::config::Root::builder().appenders(appenders).build(log::LevelFilter::Trace))
        .context("could not assemble logging config")?;
    log4rs::init_config(config).context("could not install logging config")?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Arguments::parse();
    init_logging(args.verbose, args.log.as_deref())?;

    if args.gui {
        log::warn!("--gui was requested but no visualiser is wired into this binary; running headless");
    }

    let addr = SocketAddr::from((args.host, args.port));
    let mut server = Server::bind(addr).await.with_context(|| format!("could not bind to {addr}"))?;
    server.add_observer(Box::new(ConnectionLogger));

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("received ctrl-c, shutting down");
            let _ = shutdown_tx.send(());
        }
    });

    server.run(shutdown_rx).await;
    Ok(())
}
