use crate::player::{PlayerConfig, DEFAULT_PLAYER, DEFAULT_SOCKET_PATH, DEFAULT_YTDL_FORMAT};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "mpv_remote")]
#[command(about = "Web form that plays URLs in mpv and relays transport controls")]
pub struct Cli {
    /// Address of the web interface
    #[arg(long, default_value = "0.0.0.0")]
    pub address: String,

    /// Port of the web interface
    #[arg(short, long, default_value_t = 8080)]
    pub port: u16,

    /// Path of mpv's IPC socket
    #[arg(long, default_value = DEFAULT_SOCKET_PATH)]
    pub socket: PathBuf,

    /// Player executable
    #[arg(long, default_value = DEFAULT_PLAYER)]
    pub player: String,

    /// Format selector handed to youtube-dl/yt-dlp
    #[arg(long, default_value = DEFAULT_YTDL_FORMAT)]
    pub ytdl_format: String,
}

impl Cli {
    pub fn player_config(&self) -> PlayerConfig {
        PlayerConfig {
            program: self.player.clone(),
            ytdl_format: self.ytdl_format.clone(),
            socket_path: self.socket.clone(),
        }
    }
}
