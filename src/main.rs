use loan_a2a::{
    a2a::Payload,
    agents::{DATAFETCHER, DataFetcherAction},
    shared::{AppConfig, AppContext},
    store::document_store::EXPECTED_DOCUMENTS,
};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const HELP: &str = "Commands:
  data                 - list available data files
  assess <types..>     - fetch and analyze the available subset of <types>
  fetch <types..>      - detailed analysis of specific documents
  search <name..>      - search public information about a business
  question <text>      - ask the model about the documents assessed so far
  history              - show the agent message log
  help                 - show this help
  exit                 - exit";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::from_env()?;
    info!("LLM provider: {:?}", config.llm.provider);

    let context = AppContext::from_config(config).await?;
    context.check_documents().await?;
    info!("System ready (v{})", context.runtime_info.version);

    println!("{}", HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    // latest assessment summaries, fed to `question` as context
    let mut gathered: Vec<String> = Vec::new();

    loop {
        stdout.write_all(b"\n[Main]> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let mut words = line.split_whitespace();
        let command = words.next().unwrap_or_default().to_lowercase();
        let args: Vec<String> = words.map(str::to_string).collect();

        match command.as_str() {
            "" => continue,
            "exit" | "quit" => break,
            "help" => println!("{}", HELP),
            "data" => list_data(&context).await,
            "assess" => {
                if let Some(summary) = assess(&context, &args).await {
                    gathered.push(summary);
                }
            }
            "fetch" => {
                if args.is_empty() {
                    println!("Usage: fetch <types..>");
                    continue;
                }
                match context
                    .underwriter()
                    .request_additional_documents(&args, "requested from the shell")
                    .await
                {
                    Ok(summary) => println!("Documents retrieved:\n{}", summary),
                    Err(e) => error!("{}", e),
                }
            }
            "search" => {
                if args.is_empty() {
                    println!("Usage: search <name..>");
                    continue;
                }
                match context.underwriter().search_applicant(&args.join(" "), None).await {
                    Ok(summary) => println!("Search results:\n{}", summary),
                    Err(e) => error!("{}", e),
                }
            }
            "question" => {
                if args.is_empty() {
                    println!("Usage: question <text>");
                    continue;
                }
                match context
                    .underwriter()
                    .ask(&args.join(" "), &gathered.join("\n\n"))
                    .await
                {
                    Ok(answer) => println!("\n{}", answer),
                    Err(e) => error!("{}", e),
                }
            }
            "history" => show_history(&context).await,
            other => println!("Unknown command '{}'. Type 'help' for available commands.", other),
        }
    }

    info!("Exchanged {} messages this session", context.exchange.history_len().await);
    Ok(())
}

async fn list_data(context: &AppContext) {
    let response = context
        .exchange
        .send(
            "main_viewer",
            DATAFETCHER,
            DataFetcherAction::ListAvailable.as_str(),
            Payload::new(),
            None,
        )
        .await;

    match response {
        Ok(response) if response.is_success() => {
            println!("Available data files:");
            let types = response
                .get("available_data_types")
                .and_then(|v| v.as_array())
                .cloned()
                .unwrap_or_default();
            for data_type in types.iter().filter_map(|v| v.as_str()) {
                println!("  {}.json", data_type);
            }
        }
        Ok(response) => println!("Error: {}", response.error_text()),
        Err(e) => error!("{}", e),
    }
}

/// Prints the assessment and hands back its summary, if any.
async fn assess(context: &AppContext, args: &[String]) -> Option<String> {
    let required: Vec<String> = if args.is_empty() {
        EXPECTED_DOCUMENTS.iter().map(|doc| doc.to_string()).collect()
    } else {
        args.to_vec()
    };

    match context.underwriter().gather_financials(&required).await {
        Ok(findings) => {
            println!("Fetched: {}", findings.fetched.join(", "));
            if !findings.missing.is_empty() {
                println!("Missing: {}", findings.missing.join(", "));
            }
            match &findings.summary {
                Some(summary) => println!("\n{}", summary),
                None => println!("None of the requested documents are available."),
            }
            findings.summary
        }
        Err(e) => {
            error!("{}", e);
            None
        }
    }
}

async fn show_history(context: &AppContext) {
    let history = context.exchange.get_history().await;
    if history.is_empty() {
        println!("No messages exchanged yet");
        return;
    }

    for message in history {
        println!(
            "{}  {} -> {}  {}  ({})",
            message.timestamp.to_rfc3339(),
            message.sender,
            message.receiver,
            message.action,
            message.id
        );
    }
}
