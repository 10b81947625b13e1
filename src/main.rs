use clap::Parser;

mod cli;
mod commands;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let opts = cli::Options::parse();
    let client = didplc::client::Client::new(opts.plc_host);

    match opts.command {
        cli::Command::Resolve(command) => command.run(&client).await,
        cli::Command::Submit(command) => command.run(&client).await,
        cli::Command::Oplog(command) => command.run(&client).await,
        cli::Command::Verify(command) => command.run(&client).await,
    }
}
