use anyhow::Result;
use chatbot_server::{ChatBackend, SecurityConfig, ServerConfig, create_app};
use clap::{Parser, Subcommand};
use tracing::{Level, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "chatbot-server")]
#[command(about = "Chat API server with Firebase request verification")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the chat HTTP server
    Serve {
        #[arg(short, long, env = "PORT", default_value = "8080")]
        port: u16,
        #[arg(long, default_value = "0.0.0.0")]
        host: String,
    },
    /// Print the security mode resolved from the environment
    SecurityMode,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("chatbot_server=info".parse()?))
        .with_max_level(Level::INFO)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { port, host } => {
            let security = SecurityConfig::from_env();
            let server = ServerConfig::from_env();
            info!("Resolved chat security mode: {}", security.mode);
            match server.chat_backend {
                ChatBackend::Genkit => info!("Using Genkit service at {}", server.genkit_base_url),
                ChatBackend::Gemini => info!("Using Gemini model {}", server.gemini_model),
            }

            let app = create_app(&security, &server)?;

            let bind = format!("{}:{}", host, port);
            let listener = tokio::net::TcpListener::bind(&bind).await?;
            info!("Chat server listening on http://{}", bind);

            axum::serve(listener, app).await?;
        }
        Commands::SecurityMode => {
            let security = SecurityConfig::from_env();
            println!("{}", security.mode);
            if let Some(project_id) = &security.project_id {
                println!("  Project id:       {}", project_id);
            }
            match &security.project_number {
                Some(number) => println!("  App Check issuer: {}", number.app_check_issuer()),
                None => println!("  App Check issuer: <FIREBASE_PROJECT_NUMBER unset>"),
            }
            println!("  Key set URL:      {}", security.jwks_url);
        }
    }

    Ok(())
}
