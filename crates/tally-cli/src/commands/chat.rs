//! Chat command implementation

use std::io::Write;

use anyhow::{Context as _, Result};
use tally_core::{
    analyze, build_system_prompt, AnthropicBackend, ChatOrchestrator, ChatResult, Config,
    FinancialInsights, Message, ToolDispatcher,
};
use tokio::io::{AsyncBufReadExt, BufReader};

use super::{open_service, open_store};

/// Orchestrator wired to the configured chat API and budgeting API
pub fn build_orchestrator(config: &Config) -> Result<ChatOrchestrator> {
    let api_key = config.require_chat_api_key()?;
    let backend = AnthropicBackend::new(
        &config.chat_api_url,
        api_key,
        &config.chat_model,
        config.http_timeout,
    )
    .context("Failed to create chat API client")?
    .with_max_tokens(config.max_tokens);

    let dispatcher = ToolDispatcher::new(open_service(config)?, open_store(config), config.default_months);
    Ok(ChatOrchestrator::new(Box::new(backend), dispatcher).with_max_iterations(config.max_iterations))
}

/// System prompt from the current selection, insights and user context
///
/// Rebuilt every turn because tools can switch budgets or refresh data.
pub async fn current_system_prompt(orchestrator: &ChatOrchestrator, config: &Config) -> Result<String> {
    let dispatcher = orchestrator.dispatcher();
    let context = dispatcher.store().load_context()?;
    let selection = dispatcher.store().load_selection()?;

    let insights = match selection {
        Some(ref budget) => {
            let transactions = dispatcher
                .service()
                .fetch(&budget.id, config.default_months, false)
                .await
                .with_context(|| format!("Failed to fetch transactions for {}", budget.name))?;
            analyze(&transactions, None)
        }
        None => FinancialInsights::default(),
    };

    Ok(build_system_prompt(&insights, &context, selection.as_ref()))
}

/// One question and answer
pub async fn ask(
    orchestrator: &ChatOrchestrator,
    config: &Config,
    question: &str,
    history: Vec<Message>,
) -> Result<ChatResult> {
    let system = current_system_prompt(orchestrator, config).await?;
    let result = orchestrator
        .execute_with_tracking(&system, question, history)
        .await
        .context("Chat request failed")?;

    for call in &result.tool_calls {
        tracing::info!(tool = %call.name, success = call.success, "Assistant used tool");
    }
    Ok(result)
}

pub async fn cmd_chat(config: &Config, question: Option<&str>) -> Result<()> {
    let orchestrator = build_orchestrator(config)?;

    if let Some(question) = question {
        let result = ask(&orchestrator, config, question, Vec::new()).await?;
        println!("{}", result.response);
        return Ok(());
    }

    println!("💬 Tally assistant ({}). Type 'exit' to quit, '/clear' to start over.", orchestrator.model());
    let mut history: Vec<Message> = Vec::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("\nyou> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        match line {
            "" => continue,
            "exit" | "quit" => break,
            "/clear" => {
                history.clear();
                println!("(conversation cleared)");
                continue;
            }
            _ => {}
        }

        match ask(&orchestrator, config, line, history.clone()).await {
            Ok(result) => {
                println!("\ntally> {}", result.response);
                history = result.messages;
            }
            Err(e) => eprintln!("\n⚠ {:#}", e),
        }
    }
    Ok(())
}
