//! The `exsolve models` command for inspecting the remote vision models.

use clap::{Args, Subcommand};
use exsolve_core::{Config, Exsolver};

/// Arguments for the `models` command.
#[derive(Args, Debug)]
pub struct ModelsArgs {
    #[command(subcommand)]
    pub command: ModelsCommand,
}

/// Subcommands for model inspection.
#[derive(Subcommand, Debug)]
pub enum ModelsCommand {
    /// List eligible vision models, in the order they are tried
    List {
        /// Gemini API key for this call (overrides gemini.api_key)
        #[arg(long)]
        api_key: Option<String>,
    },
}

/// Execute the models command.
pub async fn execute(args: ModelsArgs, config: Config) -> anyhow::Result<()> {
    match args.command {
        ModelsCommand::List { api_key } => {
            let exsolver = Exsolver::new(config, api_key.as_deref())?;
            let models = exsolver.models().await?;
            print!("{}", format_model_list(&models));
        }
    }
    Ok(())
}

fn format_model_list(models: &[String]) -> String {
    models
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let role = if i == 0 { "primary" } else { "fallback" };
            format!("{:>2}. {name} ({role})\n", i + 1)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_model_list() {
        let models = vec![
            "models/gemini-2.0-flash".to_string(),
            "models/gemini-1.5-pro".to_string(),
        ];
        assert_eq!(
            format_model_list(&models),
            " 1. models/gemini-2.0-flash (primary)\n 2. models/gemini-1.5-pro (fallback)\n"
        );
        assert_eq!(format_model_list(&[]), "");
    }
}
