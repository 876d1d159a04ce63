//! `agon run`: drive a simulated competition end to end.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use comfy_table::{presets::UTF8_FULL, Cell, Table};
use console::style;

use crate::adapters::{
    HeuristicJudge, JaccardSimilarity, JsonFileReportSink, ScriptedLine, ScriptedPersona,
    StopwordStallClassifier,
};
use crate::domain::models::report::FinalReport;
use crate::domain::models::transcript::{Claim, EvidenceRef};
use crate::domain::ports::ReportSink;
use crate::infrastructure::config::ConfigLoader;
use crate::services::CompetitionOrchestrator;

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Competition topic.
    #[arg(long, default_value = "how to cut tail latency in a multi-tenant index")]
    pub topic: String,

    /// Configuration file (YAML). Falls back to agon.yaml + AGON_* env.
    #[arg(long)]
    pub config: Option<String>,

    /// Override the configured random seed.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Override the configured turn ceiling.
    #[arg(long)]
    pub turns: Option<u32>,

    /// Number of scripted participants (2-6).
    #[arg(long, default_value_t = 4)]
    pub participants: usize,

    /// Write the frozen report as JSON to this path.
    #[arg(long)]
    pub output: Option<String>,
}

const ROSTER: [&str; 6] = ["Aster", "Brook", "Cedar", "Dune", "Ember", "Flint"];

pub async fn execute(args: RunArgs, json: bool) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => ConfigLoader::load_from_file(path)?,
        None => ConfigLoader::load()?,
    };
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if let Some(turns) = args.turns {
        config.max_turns = turns;
    }
    let participants = args.participants.clamp(2, ROSTER.len());

    let mut orchestrator = CompetitionOrchestrator::new(
        &args.topic,
        config,
        Arc::new(HeuristicJudge),
        Arc::new(JaccardSimilarity),
        Arc::new(StopwordStallClassifier::default()),
    );
    for name in &ROSTER[..participants] {
        orchestrator
            .add_participant(*name, Arc::new(scripted_persona(name, &args.topic)))
            .context("registration failed")?;
    }

    let report = orchestrator.run().await?;

    if let Some(output) = &args.output {
        JsonFileReportSink::new(output).persist(&report).await?;
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        render(&report);
    }
    Ok(())
}

/// Deterministic script for one roster member, flavored by slot so the
/// personas do not collapse into each other.
fn scripted_persona(name: &str, topic: &str) -> ScriptedPersona {
    let slot = ROSTER.iter().position(|n| *n == name).unwrap_or(0);
    let lines = vec![
        ScriptedLine::new(format!(
            "{name} opens on {topic}: the bottleneck worth naming first is angle {slot}."
        )),
        ScriptedLine::new(format!(
            "Building on the prior turn, {name} proposes splitting the problem along axis {slot} \
             and measuring each half separately."
        ))
        .with_claim(
            Claim::factual("p99 latency is dominated by the largest tenant shard")
                .with_evidence(EvidenceRef::new(format!("bench:{slot}"))),
        ),
        ScriptedLine::new(format!(
            "{name} pushes a sharper variant: invert the index layout entirely, accepting a \
             write amplification cost near factor {slot}."
        )),
        ScriptedLine::new(format!(
            "To consolidate, {name} ties the earlier measurements to the layout change and \
             names the remaining open question number {slot}."
        ))
        .with_claim(Claim::factual("the cache hit rate doubles under the new layout")),
    ];
    ScriptedPersona::new(name, lines)
}

fn render(report: &FinalReport) {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec![
        Cell::new("#"),
        Cell::new("Participant"),
        Cell::new("Score"),
        Cell::new("Status"),
    ]);
    for (rank, standing) in report.standings.iter().enumerate() {
        table.add_row(vec![
            Cell::new(rank + 1),
            Cell::new(&standing.display_name),
            Cell::new(format!("{:.2}", standing.score)),
            Cell::new(standing.status.as_str()),
        ]);
    }
    println!("{table}");

    match report
        .winner
        .and_then(|id| report.standings.iter().find(|s| s.participant == id))
    {
        Some(winner) => println!(
            "{} {}",
            style("winner:").green().bold(),
            style(&winner.display_name).bold()
        ),
        None => println!("{}", style("no winner (partial run)").yellow()),
    }
    println!(
        "turns: {}  penalties: {}  faults: {}  fingerprint: {}",
        report.competition.turn,
        report.competition.penalties.len(),
        report.competition.faults.len(),
        report.fingerprint
    );
}
