mod actions;
mod app;

use actions::Command;
use anyhow::Result;
use app::AppController;
use clap::Parser;
use difm_player::audio::AudioOutput;
use difm_player::{DefaultBackend, LogReporter, Player, StreamSet};
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Console player for DI.fm channels
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// JSON stream set listing channels and their streams
    #[arg(long)]
    catalog: PathBuf,

    /// Premium listen key appended to stream URLs
    #[arg(long, env = "DIFM_LISTEN_KEY")]
    listen_key: Option<String>,

    /// Channel id or name to start playing
    #[arg(long)]
    channel: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let stream_set = Arc::new(StreamSet::load(&args.catalog)?);
    let output = Rc::new(AudioOutput::new());
    let backend = DefaultBackend::new(tokio::runtime::Handle::current(), output.clone());
    let player = Player::new(Box::new(backend), Box::new(output), Box::new(LogReporter));

    let mut app_controller = AppController::new(player, stream_set, args.listen_key);
    if let Some(channel) = args.channel {
        app_controller.handle_command(Command::Select(channel))?;
        app_controller.handle_command(Command::Play)?;
    }

    println!("Commands: list, select <channel>, clear, play, pause, status, quit");
    run_app(&mut app_controller).await?;

    app_controller.shutdown();
    Ok(())
}

async fn run_app(app_controller: &mut AppController) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut tick = tokio::time::interval(Duration::from_millis(250));

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break; // stdin closed
                };
                match line.parse::<Command>() {
                    Ok(command) => {
                        if app_controller.handle_command(command)? {
                            break;
                        }
                    }
                    Err(e) => println!("{}", e),
                }
            }
            _ = tick.tick() => app_controller.tick(),
        }
    }

    Ok(())
}
