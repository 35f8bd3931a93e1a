//! rust-torrent-maker - Main entry point
//!
//! Create, inspect, edit and hash-check BitTorrent metainfo files.

use anyhow::{Context, Result};
use rust_torrent_maker::cli::{edit_options, edit_output, format_bytes};
use rust_torrent_maker::{
    CheckEvent, CliArgs, Command, Config, FileSink, FileSource, HashCheck, HasherControl, Metainfo, ProgressDisplay,
    TorrentFile, TorrentMaker, TorrentParser,
};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[tokio::main]
async fn main() {
    let args = CliArgs::parse_args();
    init_logging(&args);
    debug!("CLI arguments: {:?}", args);

    if let Err(e) = run(args).await {
        eprintln!("\r\x1b[2KError: {:#}", e);
        std::process::exit(1);
    }
}

/// Initialize logging based on verbosity settings
fn init_logging(args: &CliArgs) {
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(args.log_level())
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    if args.verbose {
        subscriber.pretty().init();
    } else {
        subscriber.compact().init();
    }
}

async fn run(args: CliArgs) -> Result<()> {
    match &args.command {
        Command::Make(make) => {
            let config = Config::from_make_args(&args, make).context("Invalid configuration")?;
            config.validate().context("Invalid configuration")?;
            run_make(&config).await
        }
        Command::Edit(edit) => {
            let mut metainfo = load(&edit.torrent).await?;
            let options = edit_options(edit, metainfo.info());
            let output = edit_output(edit);
            rust_torrent_maker::torrent::apply_edit(&mut metainfo, &options, rust_torrent_maker::torrent::unix_now())
                .context("Failed to edit torrent")?;
            rust_torrent_maker::torrent::write_metainfo(&metainfo, &output)
                .await
                .context("Failed to write torrent")?;
            if !args.quiet {
                println!("File written to {}", output.display());
            }
            Ok(())
        }
        Command::Hashcheck(check) => {
            let config = Config::from_check_args(&args, check).context("Invalid configuration")?;
            config.validate().context("Invalid configuration")?;
            run_hashcheck(&config, &check.torrent).await
        }
        Command::Infohash(arg) => {
            println!("{}", load(&arg.torrent).await?.info_hash_hex());
            Ok(())
        }
        Command::Pieces(arg) => {
            for piece in &load(&arg.torrent).await?.info().pieces {
                println!("{}", hex::encode(piece));
            }
            Ok(())
        }
        Command::Name(arg) => {
            println!("{}", load(&arg.torrent).await?.info().name);
            Ok(())
        }
        Command::Announce(arg) => {
            println!("{}", load(&arg.torrent).await?.info().announce);
            Ok(())
        }
        Command::Announcelist(arg) => {
            for tier in &load(&arg.torrent).await?.info().announce_list {
                println!("{}", tier.join(", "));
            }
            Ok(())
        }
        Command::Files(arg) => {
            let metainfo = load(&arg.torrent).await?;
            let files: Vec<TorrentFile> = metainfo.info().files_iter().collect();
            if arg.json {
                println!("{}", serde_json::to_string_pretty(&files).context("Failed to serialize file list")?);
            } else {
                for file in &files {
                    println!("{} {}", file.path.join("/"), file.length);
                }
            }
            Ok(())
        }
        Command::Urllist(arg) => {
            for url in &load(&arg.torrent).await?.info().url_list {
                println!("{}", url);
            }
            Ok(())
        }
        Command::Info(arg) => {
            display_torrent_info(&load(&arg.torrent).await?);
            Ok(())
        }
    }
}

async fn load(source: &str) -> Result<Metainfo> {
    TorrentParser::load(source)
        .await
        .with_context(|| format!("Failed to read torrent {}", source))
}

async fn run_make(config: &Config) -> Result<()> {
    let announce = config.announce.clone().context("Must provide at least one announce URL")?;
    let output = config.output_path();

    let maker = TorrentMaker::new(
        announce,
        &config.dir,
        FileSource::Paths(config.files.clone()),
        config.make_options(),
    )
    .await
    .context("Failed to prepare torrent")?;
    let mut sink = FileSink::create(&output).await.context("Failed to create output file")?;

    let signals = watch_signals(maker.control());
    let mut display = ProgressDisplay::new(config.is_quiet());
    let result = maker
        .run(&mut sink, |progress| {
            if let Err(e) = display.update(progress) {
                debug!("Failed to draw progress: {}", e);
            }
        })
        .await;
    signals.abort();

    let metainfo = result.context("Failed to make torrent")?;
    display.print_made(&output.display().to_string(), &metainfo.info_hash_hex())?;
    Ok(())
}

async fn run_hashcheck(config: &Config, torrent: &str) -> Result<()> {
    let metainfo = load(torrent).await?;
    let check = HashCheck::new(&metainfo, &config.dir, config.check_options())
        .await
        .context("Failed to prepare hash check")?;

    let signals = watch_signals(check.control());
    let mut display = ProgressDisplay::new(config.is_quiet());
    let result = check
        .run_with_events(|event| {
            let drawn = match event {
                CheckEvent::Piece(piece) => display.update_check(piece),
                CheckEvent::Progress(progress) => {
                    display.record_speed(progress);
                    Ok(())
                }
            };
            if let Err(e) = drawn {
                debug!("Failed to draw progress: {}", e);
            }
        })
        .await;
    signals.abort();

    let report = result.context("Hash check failed")?;
    display.print_checked(&report)?;
    if !report.is_complete() {
        warn!("{} of {} pieces do not match", report.mismatched.len(), report.pieces);
    }
    Ok(())
}

/// SIGINT stops the run; on unix SIGUSR1 toggles pause
fn watch_signals(control: HasherControl) -> JoinHandle<()> {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};

            match signal(SignalKind::user_defined1()) {
                Ok(mut usr1) => loop {
                    tokio::select! {
                        _ = tokio::signal::ctrl_c() => break,
                        Some(()) = usr1.recv() => {
                            if control.toggle() {
                                info!("Hasher is now {:?}", control.state());
                            }
                        }
                    }
                },
                Err(e) => {
                    warn!("Cannot listen for SIGUSR1: {}", e);
                    if tokio::signal::ctrl_c().await.is_err() {
                        return;
                    }
                }
            }
        }
        #[cfg(not(unix))]
        {
            if tokio::signal::ctrl_c().await.is_err() {
                return;
            }
        }

        if control.stop() {
            info!("Interrupted, stopping");
        }
    })
}

/// Display torrent information
fn display_torrent_info(metainfo: &Metainfo) {
    let info = metainfo.info();
    println!("Torrent Information:");
    println!("  Name: {}", info.name);
    println!("  Size: {} ({})", info.total_size(), format_bytes(info.total_size()));
    println!("  Pieces: {}", info.piece_count());
    println!("  Piece length: {}", format_bytes(info.piece_length));
    println!("  Info hash: {}", metainfo.info_hash_hex());
    println!("  Private: {}", if info.private { "yes" } else { "no" });
    if let Some(source) = &info.source {
        println!("  Source: {}", source);
    }
    if let Some(comment) = &info.comment {
        println!("  Comment: {}", comment);
    }
    if let Some(created_by) = &info.created_by {
        println!("  Created by: {}", created_by);
    }
    if let Some(date) = info.creation_date {
        println!("  Creation date: {}", date);
    }
    println!();
    println!("Trackers:");
    for tracker in info.trackers() {
        println!("  {}", tracker);
    }
    if !info.url_list.is_empty() {
        println!();
        println!("Web seeds:");
        for url in &info.url_list {
            println!("  {}", url);
        }
    }
    println!();
    println!("Files:");
    for file in info.files_iter() {
        println!("  {} ({})", file.path.join("/"), format_bytes(file.length));
    }
}
