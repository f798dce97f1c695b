//! Interactive chat client for the HTTP front door.
//!
//! Reads questions from stdin, posts them to the server, and prints the
//! answer with its source citations. Type `exit` to quit.

use std::io::Write;

use tokio::io::{AsyncBufReadExt, BufReader};

use concourse::answer::ChatReply;
use concourse::config::ChatConfig;
use concourse::telemetry::init_tracing;
use concourse::types::PipelineError;

#[tokio::main]
async fn main() -> Result<(), PipelineError> {
    init_tracing();
    let config = ChatConfig::from_env()?;
    let endpoint = format!(
        "{}/ask",
        config.server_url.as_str().trim_end_matches('/')
    );

    let client = reqwest::Client::builder()
        .timeout(config.timeout)
        .build()
        .map_err(|err| {
            PipelineError::Configuration(format!("failed to build HTTP client: {err}"))
        })?;

    println!("Airport chatbot ready! Type 'exit' to quit.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("You: ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if question.eq_ignore_ascii_case("exit") {
            break;
        }

        match send_question(&client, &endpoint, question).await {
            Ok(reply) => {
                println!("Chatbot: {}", reply.answer);
                if !reply.sources.is_empty() {
                    println!("Sources:");
                    for source in &reply.sources {
                        println!("  - {source}");
                    }
                }
            }
            Err(err) if err.is_timeout() => {
                println!(
                    "Error: request timed out after {}s; the model may be taking too long.",
                    config.timeout.as_secs()
                );
            }
            Err(err) if err.is_connect() => {
                println!("Error: could not connect to the server at {endpoint}; is `serve` running?");
            }
            Err(err) => {
                println!("Error: {err}");
            }
        }
    }

    Ok(())
}

async fn send_question(
    client: &reqwest::Client,
    endpoint: &str,
    question: &str,
) -> Result<ChatReply, reqwest::Error> {
    client
        .post(endpoint)
        .json(&serde_json::json!({ "query": question }))
        .send()
        .await?
        .error_for_status()?
        .json()
        .await
}
