use std::time::Duration;

use clap::{Parser, Subcommand};
use geoprovider_test_shared::{
    TestingRequest, TestingResponse, encode_line, get_socket_name, prelude::*,
};
use interprocess::local_socket::{tokio::Stream, traits::tokio::Stream as _};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader};

#[derive(Parser)]
struct Cli {
    /// Name of the local socket the test daemon is listening on
    socket: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Forward the provider's deliveries to drivers
    SetCallback,
    /// Start the provider
    Start {
        /// Ask for high accuracy fixes
        #[arg(long)]
        high_accuracy: bool,
    },
    /// Stop the provider
    Stop,
    /// Print the provider's current result
    Get,
    /// Print the provider's lifecycle state and whether permission was granted
    State,
    /// Grant location permission
    Grant,
    /// Print deliveries as they arrive
    Watch {
        /// How long to watch for
        #[arg(long, default_value_t = 10)]
        seconds: u64,
    },
}

impl Commands {
    fn as_request(&self) -> Option<TestingRequest> {
        match self {
            Self::SetCallback => Some(TestingRequest::SetCallback),
            Self::Start { high_accuracy } => Some(TestingRequest::Start {
                high_accuracy: *high_accuracy,
            }),
            Self::Stop => Some(TestingRequest::Stop),
            Self::Get => Some(TestingRequest::GetPosition),
            Self::State => Some(TestingRequest::GetState),
            Self::Grant => Some(TestingRequest::GrantPermission),
            Self::Watch { .. } => None,
        }
    }
}

/// Read and print a single response, returns `None` once the daemon hangs up
async fn read_resp(
    recv: &mut (impl AsyncBufRead + Unpin),
    line: &mut String,
) -> Result<Option<TestingResponse>> {
    line.clear();
    let read = recv
        .read_line(line)
        .await
        .context("Failed to read response")?;
    if read == 0 {
        return Ok(None);
    }

    let resp = serde_json::from_str::<TestingResponse>(line).context("Failed to parse response")?;
    println!(
        "{}",
        serde_json::to_string_pretty(&resp).context("Failed to encode response")?
    );
    Ok(Some(resp))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result {
    colog::init();

    let cli = Cli::parse();

    let socket_name = get_socket_name(cli.socket.clone()).context("Failed to get socket name")?;

    let stream = Stream::connect(socket_name)
        .await
        .context("Failed to connect to socket")?;

    let mut recv = BufReader::new(&stream);
    let mut send = &stream;
    let mut line = String::with_capacity(256);

    if let Some(req) = cli.command.as_request() {
        send.write_all(&encode_line(&req)?)
            .await
            .context("Failed to send request")?;

        loop {
            match read_resp(&mut recv, &mut line).await? {
                Some(TestingResponse::Error(why)) => bail!("Daemon reported an error: {why}"),
                Some(resp) if resp.is_final() => break,
                Some(_) => {}
                None => bail!("Daemon closed the connection"),
            }
        }
    } else if let Commands::Watch { seconds } = cli.command {
        let watch = async {
            while read_resp(&mut recv, &mut line).await?.is_some() {}
            Ok::<_, anyhow::Error>(())
        };

        if let Ok(res) = tokio::time::timeout(Duration::from_secs(seconds), watch).await {
            res?;
        }
    }

    Ok(())
}
