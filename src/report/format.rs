//! Formatted terminal output.
//!
//! Formatting lives here so the pipeline and the techniques stay free of
//! presentation code.

use std::collections::BTreeMap;

use chrono::{DateTime, Local};

use crate::app::pipeline::RunOutput;
use crate::engine::Directive;
use crate::report::{Tally, tally_by_species};

/// Header line with tool name and timestamp.
pub fn format_header(title: &str, at: DateTime<Local>) -> String {
    format!("=== vrb - {title} ({}) ===\n", at.format("%Y-%m-%d %H:%M:%S"))
}

/// Technique list plus the directives issued per context.
pub fn format_configuration(output: &RunOutput) -> String {
    let mut out = String::new();

    if output.techniques.is_empty() {
        out.push_str("No biasing techniques configured.\n");
    } else {
        out.push_str("Biasing techniques:\n");
        for (index, (name, kind)) in output.techniques.iter().enumerate() {
            out.push_str(&format!("{index:>3}  {:<24} {kind}\n", truncate(name, 24)));
        }
    }

    out.push_str("\nDirectives:\n");
    for context in &output.contexts {
        let counts = directive_counts(&context.directives);
        if counts.is_empty() {
            out.push_str(&format!("  context {:>2}: none\n", context.context));
            continue;
        }
        let parts: Vec<String> = counts.iter().map(|(kind, n)| format!("{kind}={n}")).collect();
        out.push_str(&format!("  context {:>2}: {}\n", context.context, parts.join(" ")));
    }

    out
}

/// Verdict totals per context and per species.
pub fn format_verdicts(output: &RunOutput) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "Tracks: {} over {} run(s) | continue={} kill={}\n",
        output.verdicts.len(),
        output.runs,
        output.continues(),
        output.kills()
    ));

    out.push('\n');
    out.push_str(&format!("{:<8} {:>10} {:>10}\n", "context", "continue", "kill"));
    out.push_str(&format!("{:-<8} {:-<10} {:-<10}\n", "", "", ""));
    for context in &output.contexts {
        out.push_str(&format!(
            "{:<8} {:>10} {:>10}\n",
            context.context, context.continues, context.kills
        ));
    }

    out.push('\n');
    out.push_str(&format_species_table(&tally_by_species(&output.verdicts)));
    out
}

fn format_species_table(tallies: &BTreeMap<String, Tally>) -> String {
    let mut out = String::new();
    out.push_str(&format!("{:<16} {:>10} {:>10} {:>8}\n", "species", "continue", "kill", "kill%"));
    out.push_str(&format!("{:-<16} {:-<10} {:-<10} {:-<8}\n", "", "", "", ""));
    for (species, tally) in tallies {
        out.push_str(&format!(
            "{:<16} {:>10} {:>10} {:>7.1}%\n",
            truncate(species, 16),
            tally.continues,
            tally.kills,
            100.0 * tally.kill_fraction()
        ));
    }
    out
}

fn directive_counts(directives: &[Directive]) -> BTreeMap<&'static str, usize> {
    let mut counts = BTreeMap::new();
    for directive in directives {
        *counts.entry(directive.label()).or_insert(0) += 1;
    }
    counts
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out = String::new();
    for (i, ch) in s.chars().enumerate() {
        if i + 1 >= max {
            break;
        }
        out.push(ch);
    }
    out.push('.');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::pipeline::{ContextReport, Verdict};
    use crate::domain::{Classification, TechniqueKind};

    fn output() -> RunOutput {
        let verdict = |track: usize, species: &str, classification| Verdict {
            run: 0,
            track,
            context: 0,
            species: species.to_string(),
            creator_process: None,
            region: None,
            classification,
        };
        RunOutput {
            techniques: vec![("Kill".to_string(), TechniqueKind::KillOtherParticles)],
            contexts: vec![ContextReport {
                context: 0,
                directives: vec![Directive::DirectionalSplitting { enabled: false }],
                kills: 1,
                continues: 2,
            }],
            verdicts: vec![
                verdict(0, "gamma", Classification::Continue),
                verdict(1, "e-", Classification::Kill),
                verdict(2, "gamma", Classification::Continue),
            ],
            runs: 1,
        }
    }

    #[test]
    fn configuration_lists_techniques_and_directive_counts() {
        let text = format_configuration(&output());
        assert!(text.contains("Kill"));
        assert!(text.contains("KillOtherParticles"));
        assert!(text.contains("directional-splitting=1"));
    }

    #[test]
    fn verdicts_are_tallied_per_species() {
        let text = format_verdicts(&output());
        assert!(text.contains("continue=2 kill=1"));
        let tallies = tally_by_species(&output().verdicts);
        assert_eq!(tallies["gamma"], Tally { continues: 2, kills: 0 });
        assert_eq!(tallies["e-"].kill_fraction(), 1.0);
    }

    #[test]
    fn truncate_marks_long_names() {
        assert_eq!(truncate("abcdef", 4), "abc.");
        assert_eq!(truncate("abc", 4), "abc");
    }
}
