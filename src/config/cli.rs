use crate::utils::error::Result;
use crate::utils::validation::{validate_non_empty_string, Validate};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "docstamp")]
#[command(about = "Fill DOCX templates, swap placeholder pictures and stamp PDFs")]
#[command(version)]
pub struct CliConfig {
    /// TOML file with limits, SSRF policy and stamp bounds
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Emit logs as JSON lines")]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Fill `{{field}}` tags of a DOCX template from a JSON object
    Render {
        #[arg(long)]
        template: String,
        /// JSON file holding the data object
        #[arg(long)]
        data: String,
        #[arg(long)]
        output: String,
    },
    /// Replace the picture whose alt text is the placeholder marker
    ReplaceImage {
        #[arg(long)]
        input: String,
        /// Image URL; without it the document is copied unchanged
        #[arg(long = "obraz-url")]
        image_url: Option<String>,
        #[arg(long)]
        output: String,
    },
    /// Stamp an image onto the first page of a PDF
    Stamp {
        #[arg(long)]
        input: String,
        /// Image URL; without it the PDF is copied unchanged
        #[arg(long = "obraz-url")]
        image_url: Option<String>,
        #[arg(long)]
        output: String,
    },
    /// Print the effective limits as JSON
    Health,
}

impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        match &self.command {
            Command::Render {
                template,
                data,
                output,
            } => {
                validate_non_empty_string("template", template)?;
                validate_non_empty_string("data", data)?;
                validate_non_empty_string("output", output)?;
            }
            Command::ReplaceImage { input, output, .. } | Command::Stamp { input, output, .. } => {
                validate_non_empty_string("input", input)?;
                validate_non_empty_string("output", output)?;
            }
            Command::Health => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_stamp_with_global_flags() {
        let cli = CliConfig::try_parse_from([
            "docstamp",
            "stamp",
            "--input",
            "in.pdf",
            "--obraz-url",
            "https://example.com/seal.png",
            "--output",
            "out.pdf",
            "--verbose",
        ])
        .unwrap();

        assert!(cli.verbose);
        assert!(cli.validate().is_ok());
        match cli.command {
            Command::Stamp { image_url, .. } => {
                assert_eq!(image_url.as_deref(), Some("https://example.com/seal.png"))
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_replace_image_url_is_optional() {
        let cli = CliConfig::try_parse_from([
            "docstamp",
            "--config",
            "docstamp.toml",
            "replace-image",
            "--input",
            "a.docx",
            "--output",
            "b.docx",
        ])
        .unwrap();

        assert_eq!(cli.config, Some(PathBuf::from("docstamp.toml")));
        assert!(matches!(cli.command, Command::ReplaceImage { image_url: None, .. }));
    }

    #[test]
    fn test_blank_output_fails_validation() {
        let cli = CliConfig::try_parse_from([
            "docstamp", "render", "--template", "t.docx", "--data", "d.json", "--output", " ",
        ])
        .unwrap();
        assert!(cli.validate().is_err());
    }
}
