//! Terminal output: live engine spinner and colored tables.
//!
//! Uses `indicatif` for the spinner and `console` for styling.

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use caseflow::control::{ForceAdvance, QueueDepths, StageInfo};
use caseflow::engine::{EngineStatus, TriggerOutcome};
use caseflow::lifecycle::ControlResponse;
use caseflow::pipeline_config::PipelineConfig;
use caseflow::processor::CycleOutcome;
use caseflow::state_machine::Stage;

/// Spinner showing what each processor is doing while the engine runs.
pub struct EngineMonitor {
    pb: ProgressBar,
    green: Style,
    red: Style,
}

impl EngineMonitor {
    pub fn start() -> Self {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message("starting pipeline engine");
        pb.enable_steady_tick(std::time::Duration::from_millis(100));

        Self {
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
        }
    }

    pub fn update(&self, status: &EngineStatus, depths: Option<&QueueDepths>) {
        let mut line = status_line(status);
        if let Some(depths) = depths {
            line.push_str(&format!("  [{} cases, {} done]", depths.total, depths.by_stage.get(&Stage::Done).copied().unwrap_or(0)));
        }
        self.pb.set_message(line);
    }

    /// Print a line above the spinner.
    pub fn note(&self, message: &str) {
        self.pb.println(format!("  {message}"));
    }

    pub fn finish(&self, clean: bool) {
        self.pb.finish_and_clear();
        if clean {
            println!("  {} Pipeline engine stopped", self.green.apply_to("✓"));
        } else {
            println!("  {} Pipeline engine stopped with errors", self.red.apply_to("✗"));
        }
    }
}

/// One-line summary: `CLASSIFICATION:idle DATA_EXTRACTION:processing ...`.
pub fn status_line(status: &EngineStatus) -> String {
    status
        .processors
        .iter()
        .map(|(stage, p)| format!("{stage}:{}", p.status))
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn print_stages(info: &StageInfo) {
    let bold = Style::new().bold();
    let dim = Style::new().dim();
    println!("{}", bold.apply_to("Stages"));
    for s in &info.stages {
        println!("  {:<16} {}", bold.apply_to(&s.key), dim.apply_to(s.description));
    }
    let flow = info
        .stages
        .iter()
        .map(|s| s.key.as_str())
        .collect::<Vec<_>>()
        .join(" → ");
    println!();
    println!("  {flow}");
    println!("  {}", dim.apply_to("CLASSIFICATION exits to DONE when a case cannot be classified"));
}

pub fn print_queue(depths: &QueueDepths) {
    let bold = Style::new().bold();
    println!("{}", bold.apply_to("Queue depth"));
    for (stage, count) in &depths.by_stage {
        println!("  {:<16} {count}", stage.to_string());
    }
    println!("  {:<16} {}", "TOTAL", bold.apply_to(depths.total));
}

pub fn print_config(config: &PipelineConfig) {
    let bold = Style::new().bold();
    println!(
        "{} (created {})",
        bold.apply_to(format!("Pipeline config v{}", config.version)),
        config.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!(
        "  temperature {}  max_tokens {}",
        config.llm_params.temperature, config.llm_params.max_tokens
    );
    println!("  LOB prompt:     {}", config.lob_prompt);
    println!("  Process prompt: {}", config.process_prompt);
    println!("  Pairs:");
    for pair in &config.lob_process_pairs {
        println!("    {} | {}", pair.lob, pair.process);
    }
}

pub fn print_history(configs: &[PipelineConfig]) {
    if configs.is_empty() {
        println!("No pipeline config published yet.");
        return;
    }
    for config in configs {
        println!(
            "  v{:<4} {}  {} pairs",
            config.version,
            config.created_at.format("%Y-%m-%d %H:%M:%S"),
            config.lob_process_pairs.len()
        );
    }
}

pub fn print_response(response: &ControlResponse) {
    let (mark, style) = if response.success {
        ("✓", Style::new().green().bold())
    } else {
        ("✗", Style::new().yellow().bold())
    };
    println!("  {} {}", style.apply_to(mark), response.message);
}

pub fn print_trigger(outcome: &TriggerOutcome) {
    let message = match outcome {
        TriggerOutcome::Ran(CycleOutcome::Idle) => "no items waiting".to_string(),
        TriggerOutcome::Ran(CycleOutcome::Advanced { item_id, from, to }) => {
            format!("moved {item_id} from {from} to {to}")
        }
        TriggerOutcome::Ran(CycleOutcome::Retained { item_id, reason }) => {
            format!("{item_id} retained: {reason}")
        }
        TriggerOutcome::Skipped(status) => format!("skipped, processor is {status}"),
        TriggerOutcome::UnknownStage => "no processor reports that stage".to_string(),
    };
    print_response(&ControlResponse {
        success: matches!(outcome, TriggerOutcome::Ran(_)),
        message,
    });
}

pub fn print_force_advance(id: &str, result: &ForceAdvance) {
    let response = match result {
        ForceAdvance::Advanced { from, to, .. } => {
            ControlResponse::ok(format!("Moved {id} from {from} to {to}"))
        }
        ForceAdvance::AlreadyDone => {
            ControlResponse::rejected(format!("{id} is already in the final stage"))
        }
    };
    print_response(&response);
}
