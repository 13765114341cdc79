use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use llm_eval::backends::OpenAICompatible;
use llm_eval::config::{default_config_path, ConfigStore, StaticConfigStore, YamlConfigStore};
use llm_eval::evaluator::{
    Evaluator, EvaluatorInputData, EvaluatorSource, LogMetrics, PromptEvaluatorSource,
    RunContext, RunStatus,
};
use llm_eval::resilient::{ResilienceConfig, ResilientProvider};
use llm_eval::EvaluatorError;

use crate::args::CliArgs;
use crate::logging::init_logging;

pub async fn run() -> anyhow::Result<ExitCode> {
    let args = CliArgs::parse();
    init_logging()?;

    let mut evaluator = load_evaluator(&args.evaluator)?;
    if let Some(model) = &args.model {
        if let Some(config) = evaluator
            .prompt_evaluator_version
            .as_mut()
            .and_then(|version| version.model_config.as_mut())
        {
            config.model_name = model.clone();
        }
    }
    let input = load_input(&args.input)?;

    let mut ctx = RunContext::new();
    if let Some(locale) = &args.locale {
        ctx = ctx.with_locale(locale.clone());
    }

    let mut client = OpenAICompatible::new(args.api_key.clone(), args.base_url.clone())?
        .with_stream(args.stream);
    if let Some(secs) = args.timeout {
        client = client.with_timeout(Duration::from_secs(secs));
    }
    let provider = ResilientProvider::new(
        Arc::new(client),
        ResilienceConfig::defaults().with_max_attempts(args.retries),
    );

    let (config, has_config) = load_config(args.config.as_deref())?;
    let source = PromptEvaluatorSource::new(Arc::new(provider), Arc::new(LogMetrics), config);
    if has_config {
        source
            .pre_handle(&ctx, &mut evaluator)
            .await
            .context("resolve evaluator configuration")?;
    }

    if args.debug {
        return match source.debug(&ctx, &evaluator, &input).await {
            Ok(output) => {
                println!("{}", serde_json::to_string_pretty(&output)?);
                Ok(ExitCode::SUCCESS)
            }
            Err(EvaluatorError::RunFailed(message)) => {
                eprintln!("evaluator run failed: {message}");
                Ok(ExitCode::FAILURE)
            }
            Err(err) => Err(err.into()),
        };
    }

    let outcome = source.run(&ctx, &evaluator, &input).await?;
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(match outcome.status {
        RunStatus::Success => ExitCode::SUCCESS,
        RunStatus::Fail => ExitCode::FAILURE,
    })
}

fn load_evaluator(path: &Path) -> anyhow::Result<Evaluator> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("read evaluator definition {}", path.display()))?;
    serde_yaml::from_str(&contents)
        .with_context(|| format!("parse evaluator definition {}", path.display()))
}

/// Accepts either typed input fields or a flat map of field name to text.
fn load_input(path: &Path) -> anyhow::Result<EvaluatorInputData> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("read input {}", path.display()))?;
    if let Ok(input) = serde_json::from_str::<EvaluatorInputData>(&contents) {
        if !input.input_fields.is_empty() {
            return Ok(input);
        }
    }
    let fields: HashMap<String, String> = serde_json::from_str(&contents)
        .with_context(|| format!("parse input {}", path.display()))?;
    Ok(fields
        .into_iter()
        .fold(EvaluatorInputData::default(), |input, (name, text)| {
            input.with_text(name, text)
        }))
}

fn load_config(explicit: Option<&Path>) -> anyhow::Result<(Arc<dyn ConfigStore>, bool)> {
    let path: Option<PathBuf> = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => default_config_path().ok().filter(|path| path.exists()),
    };
    match path {
        Some(path) => {
            let store = YamlConfigStore::from_path(&path)?;
            Ok((Arc::new(store), true))
        }
        None => Ok((Arc::new(StaticConfigStore::default()), false)),
    }
}
