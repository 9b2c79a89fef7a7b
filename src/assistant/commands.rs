use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::{
    history::load_history,
    models::{ChatMessage, ChatRole},
    AppState,
};

use super::{prompt::SUGGESTED_PROMPTS, AssistantClient, ChatSession};

const CHAT_HELP: &str =
    "Type a question, /N to send suggested prompt N, /prompts to list them, /refresh to reload data, /quit to leave.";

/// Answer a single question over the stored history.
pub async fn ask_once(
    state: &AppState,
    prompt: &str,
    limit: Option<usize>,
    api_key: Option<String>,
) -> Result<()> {
    let limit = limit.unwrap_or(state.settings.history().limit);
    let records = load_history(&state.db, limit).await;
    let client = AssistantClient::new(state.settings.assistant(), api_key);

    println!("{}", client.respond(prompt, &records).await);
    Ok(())
}

/// Line-oriented chat with the assistant. History is loaded once and only
/// reloaded on `/refresh`.
pub async fn run_chat(state: &AppState, limit: Option<usize>, api_key: Option<String>) -> Result<()> {
    let limit = limit.unwrap_or(state.settings.history().limit);
    let client = AssistantClient::new(state.settings.assistant(), api_key);
    let mut records = load_history(&state.db, limit).await;
    let mut session = ChatSession::new();

    for message in session.messages() {
        print_message(message);
    }
    print_prompts();
    println!("{CHAT_HELP}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        let input = line.trim();

        let prompt = match input {
            "" => continue,
            "/quit" | "/exit" => break,
            "/prompts" => {
                print_prompts();
                continue;
            }
            "/refresh" => {
                match session.refresh_records(&state.db, limit).await {
                    Some(fresh) => {
                        records = fresh;
                        println!("Loaded {} record(s).", records.len());
                    }
                    None => {
                        if let Some(message) = session.messages().last() {
                            print_message(message);
                        }
                    }
                }
                continue;
            }
            command if command.starts_with('/') => match suggested_prompt(command) {
                Some(prompt) => {
                    println!("> {prompt}");
                    prompt
                }
                None => {
                    println!("{CHAT_HELP}");
                    continue;
                }
            },
            question => question,
        };

        if let Some(reply) = session.ask(&client, prompt, &records).await {
            print_message(reply);
        }
    }

    Ok(())
}

fn suggested_prompt(command: &str) -> Option<&'static str> {
    let index: usize = command.trim_start_matches('/').parse().ok()?;
    SUGGESTED_PROMPTS.get(index.checked_sub(1)?).copied()
}

fn print_prompts() {
    for (index, prompt) in SUGGESTED_PROMPTS.iter().enumerate() {
        println!("  /{} {prompt}", index + 1);
    }
}

fn print_message(message: &ChatMessage) {
    let speaker = match message.role {
        ChatRole::User => "Bạn",
        ChatRole::Model => "Trợ lý",
    };
    println!("[{}] {speaker}: {}", message.timestamp, message.content);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suggested_prompts_are_one_based() {
        assert_eq!(suggested_prompt("/1"), Some(SUGGESTED_PROMPTS[0]));
        assert_eq!(suggested_prompt("/4"), Some(SUGGESTED_PROMPTS[3]));
        assert_eq!(suggested_prompt("/0"), None);
        assert_eq!(suggested_prompt("/5"), None);
        assert_eq!(suggested_prompt("/help"), None);
    }
}
