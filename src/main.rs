use anyhow::Context;
use clap::Parser;
use p2p_chat_chain::chain::Blockchain;
use p2p_chat_chain::cli::Args;
use p2p_chat_chain::config::Config;
use p2p_chat_chain::logging;
use p2p_chat_chain::node::Node;
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::try_from(Args::parse()).context("invalid configuration")?;

    // Kept alive for the whole process: dropping it flushes the non-blocking writer.
    let _log_guard =
        logging::init(config.is_server_mode).context("failed to install logging")?;

    let chain = Arc::new(Blockchain::new());
    let node = Node::new(&config, chain.clone());
    node.start().await.context("failed to bind listener")?;

    if config.is_server_mode {
        tracing::info!("running in server mode; interactive prompt disabled");
        tokio::signal::ctrl_c()
            .await
            .context("failed to listen for shutdown signal")?;
        tracing::info!("shutdown signal received");
        return Ok(());
    }

    run_repl(node, chain).await
}

/// Reads lines from stdin: `/h` prints the chain, a blank line re-prompts,
/// anything else is mined and broadcast.
async fn run_repl(node: Arc<Node>, chain: Arc<Blockchain>) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!(">> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break; // stdin closed
        };
        let trimmed = line.trim();

        if trimmed.is_empty() {
            continue;
        } else if trimmed == "/h" {
            print_chain(&chain).await;
        } else {
            node.create_and_broadcast_chat(trimmed.to_string()).await;
        }
    }

    Ok(())
}

async fn print_chain(chain: &Blockchain) {
    for (index, chat) in chain.get_chain().await.iter().enumerate() {
        println!("{}: {}", index + 1, chat.text);
    }
}
