use std::net::SocketAddr;

use assh::{
    side::client::{Client, TrustOnFirstUse},
    Session,
};
use assh_auth::client::Auth;

use clap::Parser;
use color_eyre::eyre;
use assh_connect::channel_open::ChannelOpenContext;
use futures::{io::BufReader, AsyncWriteExt};
use tokio_util::compat::{TokioAsyncReadCompatExt, TokioAsyncWriteCompatExt};

/// An `assh` client example, running a single command on a remote host and streaming its output.
#[derive(Debug, Parser)]
pub struct Args {
    /// The address of the SSH server to connect to.
    address: SocketAddr,

    /// The username to authenticate as.
    #[arg(short, long, default_value = "root")]
    user: String,

    /// The password to authenticate with, if not using a key.
    #[arg(short, long)]
    password: Option<String>,

    /// The command to execute on the remote host.
    command: String,
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let args = Args::parse();

    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init()
        .ok();

    let stream = tokio::net::TcpStream::connect(args.address).await?;
    let session = Session::new(
        BufReader::new(stream.compat()),
        Client {
            verifier: std::sync::Arc::new(TrustOnFirstUse::new()),
            ..Default::default()
        },
    )
    .await?;

    tracing::info!("Successfully connected to `{}`", session.peer_id());

    let mut authenticate = Auth::new(args.user, assh_connect::Service);
    if let Some(password) = args.password {
        authenticate = authenticate.password(password);
    }

    let connect = session.request(authenticate).await?;

    let channel = connect.channel_open(ChannelOpenContext::Session).await?;
    channel.exec(args.command).await?;

    let mut stdout = tokio::io::stdout().compat_write();
    futures::io::copy(channel.as_reader(), &mut stdout).await?;

    if let Some(code) = channel.exit_status().await? {
        tracing::info!("Remote command exited with status `{code}`");
    }

    stdout.flush().await?;

    Ok(())
}
