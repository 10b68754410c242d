//! The binary rendezvous-kv-srv.

use rendezvous_kv_srv::*;

#[derive(clap::Parser, Debug)]
#[command(version)]
pub struct Args {
    /// By default rendezvous-kv-srv runs in "testing" configuration
    /// with much lighter resource usage settings, listening only on
    /// localhost at an os-assigned port.
    ///
    /// To setup the server to be ready to use most of the resources
    /// available on a single given machine, set this "production" mode.
    #[arg(long)]
    pub production: bool,

    /// Override the addresses to listen on. May be given more than once,
    /// e.g. `--listen 127.0.0.1:8470 --listen [::1]:8470`.
    #[arg(long)]
    pub listen: Vec<std::net::SocketAddr>,
}

fn main() -> std::io::Result<()> {
    let args = <Args as clap::Parser>::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(tracing::Level::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let mut config = if args.production {
        Config::production()
    } else {
        Config::testing()
    };

    if !args.listen.is_empty() {
        config.listen_address_list = args.listen.clone();
    }

    println!("{args:?}--{config:?}");

    let (send, recv) = std::sync::mpsc::channel();

    ctrlc::set_handler(move || {
        let _ = send.send(());
    })
    .map_err(std::io::Error::other)?;

    let srv = KvSrv::new(config)?;
    srv.print_addrs();

    let _ = recv.recv();

    println!("Terminating...");
    drop(srv);
    println!("Done.");
    std::process::exit(0);
}
