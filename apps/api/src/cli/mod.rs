//! `persona-api generate`: a terminal front-end for a running server.

pub mod browser;
pub mod client;
pub mod session;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::Args;

use crate::generation::sink::GenerationStep;
use crate::personas::form::{IncludeDemographics, IncludeSections, PersonaFormData};
use crate::personas::result::GenerationResult;
use crate::render::handlers::download_filename;
use client::{Attachment, ClientError, PersonaClient, DEFAULT_MAX_POLLS};
use session::{Screen, Session};

#[derive(Debug, Args)]
pub struct GenerateArgs {
    /// Base URL of the persona server
    #[arg(long, default_value = "http://localhost:8080")]
    pub server: String,

    /// Product or service name
    #[arg(long)]
    pub product: String,

    /// Who the product is for
    #[arg(long)]
    pub audience: String,

    /// Product website to summarize
    #[arg(long, default_value = "")]
    pub website: String,

    /// Competitor website (repeatable, up to 5)
    #[arg(long = "competitor")]
    pub competitors: Vec<String>,

    /// Job to be done
    #[arg(long, default_value = "")]
    pub job: String,

    /// Number of personas (2-5)
    #[arg(long, default_value_t = 3)]
    pub count: u8,

    #[arg(long)]
    pub interview_guide: bool,

    #[arg(long)]
    pub survey: bool,

    #[arg(long)]
    pub journey_map: bool,

    /// Demographic fields to include: age, location, gender, income (repeatable)
    #[arg(long = "demographic")]
    pub demographics: Vec<String>,

    /// Research document to upload, PDF or DOCX (repeatable)
    #[arg(long = "file")]
    pub files: Vec<PathBuf>,

    /// Use the background endpoint and poll for status instead of streaming
    #[arg(long)]
    pub poll: bool,

    /// Seconds between status polls
    #[arg(long, default_value_t = 2)]
    pub poll_interval: u64,

    /// Where to write the PDF; defaults to `<product>-personas.pdf`
    #[arg(long, short)]
    pub output: Option<PathBuf>,

    /// Skip the PDF download
    #[arg(long)]
    pub no_pdf: bool,
}

impl GenerateArgs {
    pub fn form(&self) -> Result<PersonaFormData> {
        let mut demographics = IncludeDemographics::default();
        for field in &self.demographics {
            match field.as_str() {
                "age" => demographics.age = true,
                "location" => demographics.location = true,
                "gender" => demographics.gender = true,
                "income" | "income-range" => demographics.income_range = true,
                other => bail!("unknown demographic field: {other}"),
            }
        }
        Ok(PersonaFormData {
            product_name: self.product.clone(),
            website_url: self.website.clone(),
            target_audience: self.audience.clone(),
            competitor_urls: self.competitors.clone(),
            job_to_be_done: self.job.clone(),
            persona_count: self.count,
            include_sections: IncludeSections {
                interview_guide: self.interview_guide,
                survey: self.survey,
                journey_map: self.journey_map,
            },
            include_demographics: demographics,
        })
    }
}

pub async fn run(args: GenerateArgs) -> Result<()> {
    let mut session = Session::new();
    session.start()?;

    let form = args.form()?;
    form.validate()?;
    let mut files = Vec::with_capacity(args.files.len());
    for path in &args.files {
        files.push(Attachment::from_path(path).await?);
    }

    let client = PersonaClient::new(args.server.clone())?
        .with_polling(Duration::from_secs(args.poll_interval), DEFAULT_MAX_POLLS);

    session.submit()?;
    println!("Generating {} personas for {}...", form.persona_count, form.product_name);

    let outcome = {
        let mut report = |step: Option<GenerationStep>, progress: u8| {
            session.progress(step, progress);
            if let Screen::Generating { step, progress } = session.screen() {
                let label = step.map(|s| format!("{s:?}")).unwrap_or_default();
                eprintln!("[{progress:>3}%] {label}");
            }
        };
        let generation = async {
            if args.poll {
                client.generate_polling(&form, &files, &mut report).await
            } else {
                client.generate_streaming(&form, &files, &mut report).await
            }
        };
        tokio::select! {
            outcome = generation => Some(outcome),
            _ = tokio::signal::ctrl_c() => None,
        }
    };

    let result = match outcome {
        None => {
            session.cancel()?;
            println!("Cancelled.");
            return Ok(());
        }
        Some(Err(e)) => {
            let message = e.to_string();
            session.fail(message.clone())?;
            bail!(message);
        }
        Some(Ok(result)) => result,
    };
    session.complete(result.clone())?;

    let typed: GenerationResult =
        serde_json::from_value(result.clone()).map_err(ClientError::from)?;
    println!("{}", browser::render_result(&typed));

    if !args.no_pdf {
        let path = args
            .output
            .clone()
            .unwrap_or_else(|| PathBuf::from(download_filename(&typed.product_name)));
        let bytes = client.download(&result, &path).await?;
        println!("Saved {} ({bytes} bytes)", path.display());
    }

    session.generate_new()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        args: GenerateArgs,
    }

    #[test]
    fn test_args_build_form() {
        let harness = Harness::parse_from([
            "generate",
            "--product",
            "Acme",
            "--audience",
            "freelancers",
            "--competitor",
            "https://rival.example",
            "--demographic",
            "age",
            "--demographic",
            "income",
            "--interview-guide",
            "--count",
            "4",
        ]);
        let form = harness.args.form().unwrap();
        assert_eq!(form.product_name, "Acme");
        assert_eq!(form.competitor_urls, vec!["https://rival.example"]);
        assert_eq!(form.persona_count, 4);
        assert!(form.include_sections.interview_guide);
        assert!(!form.include_sections.survey);
        assert!(form.include_demographics.age);
        assert!(form.include_demographics.income_range);
        assert!(!form.include_demographics.gender);
        assert!(!harness.args.poll);
    }

    #[test]
    fn test_unknown_demographic_is_rejected() {
        let harness = Harness::parse_from([
            "generate",
            "--product",
            "Acme",
            "--audience",
            "freelancers",
            "--demographic",
            "shoe-size",
        ]);
        assert!(harness.args.form().is_err());
    }
}
