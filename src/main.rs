use anyhow::Context;
use clap::Parser;
use docstamp::config::Command;
use docstamp::core::Storage;
use docstamp::utils::error::{DocError, ErrorSeverity};
use docstamp::utils::{logger, validation::Validate};
use docstamp::{
    CliConfig, DocumentService, LocalStorage, PlaceholderTemplateEngine, ResourceFetcher,
    ServiceConfig,
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    if cli.json_logs {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("Starting docstamp CLI");
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    if let Err(e) = cli.validate() {
        fail(&e);
    }

    let config = match ServiceConfig::load(cli.config.as_deref()) {
        Ok(config) => Arc::new(config),
        Err(e) => {
            tracing::error!("❌ Configuration validation failed: {}", e);
            fail(&e);
        }
    };

    let fetcher = match ResourceFetcher::new(config.clone()) {
        Ok(fetcher) => fetcher,
        Err(e) => fail(&e),
    };
    let service = DocumentService::new(config, fetcher, PlaceholderTemplateEngine::new());
    let storage = LocalStorage::new(".");

    match run(&cli.command, &service, &storage).await {
        Ok(Some(output)) => {
            tracing::info!("✅ Done");
            tracing::info!("📁 Output saved to: {}", output);
            println!("📁 Output saved to: {}", output);
        }
        Ok(None) => {}
        Err(e) => match e.downcast_ref::<DocError>() {
            Some(doc_err) => {
                tracing::error!(
                    "❌ Request failed: {} (Category: {:?}, Severity: {:?}, Status: {})",
                    doc_err,
                    doc_err.category(),
                    doc_err.severity(),
                    doc_err.status_code()
                );
                fail(doc_err);
            }
            None => return Err(e),
        },
    }

    Ok(())
}

async fn run(
    command: &Command,
    service: &DocumentService<ResourceFetcher, PlaceholderTemplateEngine>,
    storage: &LocalStorage,
) -> anyhow::Result<Option<String>> {
    let written = match command {
        Command::Render {
            template,
            data,
            output,
        } => {
            let template_bytes = storage.read_file(template).await?;
            let data_bytes = storage.read_file(data).await?;
            let data_json = String::from_utf8(data_bytes)
                .map_err(|_| DocError::input(format!("{} is not UTF-8 text", data)))?;
            let rendered = service.render(&template_bytes, &data_json).await?;
            storage.write_file(output, &rendered).await?;
            output
        }
        Command::ReplaceImage {
            input,
            image_url,
            output,
        } => {
            let document = storage.read_file(input).await?;
            let patched = service.replace_image(&document, image_url.as_deref()).await?;
            storage.write_file(output, &patched).await?;
            output
        }
        Command::Stamp {
            input,
            image_url,
            output,
        } => {
            let pdf = storage.read_file(input).await?;
            let stamped = service.stamp(&pdf, image_url.as_deref()).await?;
            storage.write_file(output, &stamped).await?;
            output
        }
        Command::Health => {
            let report = serde_json::to_string_pretty(&service.health())
                .context("serializing health report")?;
            println!("{}", report);
            return Ok(None);
        }
    };
    Ok(Some(written.clone()))
}

fn fail(e: &DocError) -> ! {
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 Suggestion: {}", e.recovery_suggestion());

    let exit_code = match e.severity() {
        ErrorSeverity::Low => 0,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::High => 1,
        ErrorSeverity::Critical => 3,
    };
    std::process::exit(exit_code);
}
