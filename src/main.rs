mod api;
mod session;

use std::io::Write;

use anyhow::Result;
use caligula_backend::persona::Persona;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use api::ApiClient;
use session::ChatSession;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn,caligula=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let api = ApiClient::from_env();
    tracing::info!("Backend API: {}", api.base_url());
    match api.health().await {
        Ok(status) if status.ok => tracing::info!("Backend healthy (cid {})", status.cid),
        Ok(status) => tracing::warn!("Backend reported unhealthy (cid {})", status.cid),
        Err(e) => tracing::warn!("Backend health check failed: {:#}", e),
    }

    let mut session = ChatSession::new(Persona::Caligula.greeting());
    println!("Caligula: {}", session.greeting());
    println!("(type /reset to start over, /quit to leave)");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        match line.trim() {
            "/quit" | "/exit" => break,
            "/reset" => {
                session.reset();
                println!("Caligula: {}", session.greeting());
                continue;
            }
            _ => {}
        }
        if !session.push_user(&line) {
            continue;
        }

        match api.chat(session.history()).await {
            Ok(reply) => {
                let local = reply.is_local();
                match reply.into_text() {
                    Ok(text) => {
                        tracing::debug!("reply source: {}", if local { "local" } else { "remote" });
                        println!("Caligula: {}", text);
                        session.push_reply(text);
                    }
                    Err(message) => println!("Caligula: {}", message),
                }
            }
            Err(e) => {
                tracing::warn!("Chat request failed: {:#}", e);
                println!("Caligula: Network error.");
            }
        }
    }

    Ok(())
}
