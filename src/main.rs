use std::process::ExitCode;

use clap::Parser;
use ghrelay::{
    app_init::{ServerComponents, initialize_server},
    cli::{Cli, Command, ConnectArgs, ServeArgs},
    relay_client::RelayClient,
    result::RelayError,
};
use tokio::io::BufReader;

#[tokio::main]
async fn main() -> color_eyre::Result<ExitCode> {
    color_eyre::install()?;

    let cli = Cli::parse();
    match cli.command {
        Command::Serve(args) => serve(args).await?,
        Command::Connect(args) => return Ok(connect(args).await?),
    }

    Ok(ExitCode::SUCCESS)
}

async fn serve(args: ServeArgs) -> color_eyre::Result<()> {
    let ServerComponents { server, config, _log_guard } = initialize_server(args).await?;
    tracing::debug!(
        listen = %config.listen_addr,
        database = %config.database_path.display(),
        "Resolved configuration"
    );

    server
        .serve(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        })
        .await?;

    Ok(())
}

async fn connect(args: ConnectArgs) -> color_eyre::Result<ExitCode> {
    println!("Connecting to the relay server at {}:{}...", args.host, args.port);

    let mut client = match RelayClient::connect(&args.host, args.port).await {
        Ok(client) => client,
        Err(e @ RelayError::ServerUnavailable { .. }) => {
            eprintln!("{e}");
            return Ok(ExitCode::FAILURE);
        },
        Err(e) => return Err(e.into()),
    };
    println!("Connection established.\n");

    let input = BufReader::new(tokio::io::stdin());
    let mut output = tokio::io::stdout();

    tokio::select! {
        result = client.run(input, &mut output) => result?,
        _ = tokio::signal::ctrl_c() => {
            println!("\nClient interrupted.");
            // A pending stdin read would otherwise keep the runtime alive.
            std::process::exit(130);
        },
    }

    Ok(ExitCode::SUCCESS)
}
