use std::sync::Arc;

use anyhow::{bail, Context, Result};
use log::info;

use snapsolve_lib::{
    ai::gemini::GeminiClient, db::keys, AnalysisOutcome, CapturePipeline, CertificationType,
    Database, GenericExamType, PlatformStealth, PrimaryDisplayCapturer, PromptContext,
};

fn data_dir() -> std::path::PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join("snapsolve")
}

fn context_from_args(args: &[String], default_language: String) -> Result<PromptContext> {
    let mode = args.first().map(String::as_str).unwrap_or("code");
    match mode {
        "code" => Ok(PromptContext::CodeChallenge {
            language: args.get(1).cloned().unwrap_or(default_language),
        }),
        "cert" => Ok(PromptContext::Certification(
            CertificationType::AwsCloudPractitioner,
        )),
        "exam" => Ok(PromptContext::GenericExam {
            exam_type: GenericExamType::Enem,
            extra_context: args.get(1).cloned(),
        }),
        other => bail!("unknown mode '{other}', expected code | cert | exam"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }
    env_logger::init();

    let db = Database::new(data_dir().join("snapsolve.db"))
        .context("failed to open local database")?;

    let default_language = db
        .get_setting(keys::DEFAULT_LANGUAGE)
        .await?
        .unwrap_or_else(|| "Rust".to_string());

    let pipeline = CapturePipeline::new(
        db.clone(),
        Arc::new(PlatformStealth::new()),
        Arc::new(PrimaryDisplayCapturer),
        Arc::new(GeminiClient::new(db.clone())),
    );

    let args: Vec<String> = std::env::args().skip(1).collect();
    let context = context_from_args(&args, default_language)?;

    info!("Running capture-and-analyze for {context:?}");
    let outcome = AnalysisOutcome::from_result(pipeline.capture_and_analyze(context).await);

    match (&outcome.result, &outcome.error) {
        (Some(result), _) => println!("{}", serde_json::to_string_pretty(result)?),
        (None, Some(message)) => eprintln!("Analysis failed: {message}"),
        (None, None) => eprintln!("Analysis produced no outcome"),
    }

    Ok(())
}
