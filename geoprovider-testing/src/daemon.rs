use geoprovider_network::{SERVER_HTTP_URL, server_reachable};
use geoprovider_test_shared::*;
use log::{debug, error, info, warn};
use tokio::{
    io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader},
    sync::mpsc,
};

use interprocess::local_socket::{ListenerOptions, tokio::prelude::*};

const CLI_MSG: &str = "Usage: geoprovider-test-daemon SOCKET_NAME [fake|simulated|network]";

async fn push_resp<W: AsyncWrite + Unpin>(send: &mut W, resp: &TestingResponse) -> Result {
    let encoded = encode_line(resp)?;
    send.write_all(&encoded)
        .await
        .context("Failed to send response")
}

fn parse_request(line: &str) -> Result<TestingRequest> {
    serde_json::from_str(line).context("Malformed request")
}

#[tokio::main(flavor = "current_thread")]
pub async fn main() -> Result {
    colog::init();

    let args = std::env::args().collect::<Vec<_>>();
    let raw_socket_name = args.get(1).cloned().context(CLI_MSG)?;
    let kind = args
        .get(2)
        .map(|raw_kind| raw_kind.parse::<ProviderKind>())
        .transpose()
        .context(CLI_MSG)?
        .unwrap_or_default();

    let socket_name = get_socket_name(raw_socket_name)?;
    let opts = ListenerOptions::new().name(socket_name);
    let listener = opts.create_tokio().context("Failed to bind to socket")?;
    let (resp_tx, mut resp_rx) = mpsc::unbounded_channel::<TestingResponse>();

    let session = Session::new(kind, resp_tx).context("Failed to create provider")?;

    if kind == ProviderKind::Network {
        match server_reachable(SERVER_HTTP_URL).await {
            Ok(true) => info!("Fix server at {SERVER_HTTP_URL} is up"),
            Ok(false) => warn!("Fix server at {SERVER_HTTP_URL} is unhealthy"),
            Err(why) => warn!("Fix server at {SERVER_HTTP_URL} is unreachable: {why:?}"),
        }
    }

    info!("Testing Daemon Ready, hosting a {} provider", session.kind());

    'server: loop {
        let res = tokio::select! {
            res = listener.accept() => {
                res
            },
            Ok(_) = tokio::signal::ctrl_c() => {
                break 'server;
            }
        };

        match res {
            Ok(stream) => {
                let stale = discard_pending(&mut resp_rx);
                if stale > 0 {
                    debug!("Dropped {stale} deliveries made while no driver was connected");
                }

                let mut recv = BufReader::new(&stream);
                let mut send = &stream;

                let mut buffer = String::with_capacity(256);

                'conn: loop {
                    tokio::select! {
                        Ok(_) = tokio::signal::ctrl_c() => {
                            break 'server;
                        }
                        res = recv.read_line(&mut buffer) => {
                            match res {
                                Ok(0) => {
                                    break 'conn;
                                }
                                Ok(_amnt) => {
                                    let resp = parse_request(&buffer)
                                        .map(|req| session.process_req(req))
                                        .unwrap_or_else(TestingResponse::from);
                                    buffer.clear();

                                    // Deliveries made while handling the request go out first
                                    while let Ok(delivered) = resp_rx.try_recv() {
                                        if let Err(why) = push_resp(&mut send, &delivered).await {
                                            warn!("{why:?}");
                                            break 'conn;
                                        }
                                    }

                                    if let Err(why) = push_resp(&mut send, &resp).await {
                                        warn!("{why:?}");
                                        break 'conn;
                                    }
                                }
                                Err(why) => {
                                    error!("Read Error: {why:?}");
                                    break 'conn;
                                }
                            }
                        }
                        Some(resp) = resp_rx.recv() => {
                            if let Err(why) = push_resp(&mut send, &resp).await {
                                warn!("{why:?}");
                                break 'conn;
                            }
                        }
                    }
                }
            }
            Err(why) => error!("Error from connection: {why:?}"),
        }
    }

    session.process_req(TestingRequest::Stop);

    Ok(())
}
