use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "llm-eval",
    about = "Run an LLM-backed evaluator against one input and print the result"
)]
pub struct CliArgs {
    /// Evaluator definition (YAML)
    #[arg(long, short = 'e')]
    pub evaluator: PathBuf,
    /// Input fields (JSON)
    #[arg(long, short = 'i')]
    pub input: PathBuf,
    /// Keyed evaluator configuration; defaults to the user config file when present
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,
    #[arg(long)]
    pub locale: Option<String>,
    #[arg(long)]
    pub base_url: Option<String>,
    /// Overrides the model name of the evaluator definition
    #[arg(long, short = 'm')]
    pub model: Option<String>,
    #[arg(long)]
    pub stream: bool,
    /// Attempts per model call, including the first one
    #[arg(long, default_value_t = 3)]
    pub retries: usize,
    /// Run in the debug scenario
    #[arg(long)]
    pub debug: bool,
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: String,
    /// Request timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,
}
