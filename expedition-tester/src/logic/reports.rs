use anyhow::Result;
use colored::Colorize;
use std::io::Write;
use std::time::Duration;

use super::SeedReport;
use super::simulation::EndingTally;

fn combined_endings(results: &[SeedReport]) -> EndingTally {
    results
        .iter()
        .fold(EndingTally::default(), |mut acc, report| {
            acc.won += report.endings.won;
            acc.collapsed += report.endings.collapsed;
            acc.all_knocked_out += report.endings.all_knocked_out;
            acc
        })
}

#[allow(clippy::cast_precision_loss)]
fn percent(part: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (part as f64 / total as f64) * 100.0
}

pub fn generate_console_report(
    out: &mut dyn Write,
    results: &[SeedReport],
    total_duration: Duration,
) -> Result<()> {
    writeln!(out)?;
    writeln!(out, "{}", "📊 Expedition Batch Summary".bright_cyan().bold())?;
    writeln!(out, "{}", "===========================".cyan())?;

    let total_seeds = results.len();
    let passed_seeds = results.iter().filter(|r| r.passed).count();
    let failed_seeds = total_seeds - passed_seeds;

    writeln!(out, "Total seeds: {total_seeds}")?;
    writeln!(out, "Passed: {}", passed_seeds.to_string().green())?;
    writeln!(out, "Failed: {}", failed_seeds.to_string().red())?;
    writeln!(
        out,
        "Success rate: {:.1}%",
        percent(passed_seeds, total_seeds)
    )?;
    writeln!(out, "Total time: {total_duration:?}")?;
    writeln!(out)?;

    for result in results {
        let status = if result.passed {
            "✅ PASS".green()
        } else {
            "❌ FAIL".red()
        };

        writeln!(out, "{} seed {}", status, result.seed.to_string().bold())?;
        writeln!(
            out,
            "   Iterations: {}/{} successful (party of {})",
            result.successful_iterations, result.iterations_run, result.party_size
        )?;
        writeln!(
            out,
            "   Endings: {} won / {} collapsed / {} knocked out ({:.1}% won)",
            result.endings.won,
            result.endings.collapsed,
            result.endings.all_knocked_out,
            result.endings.win_rate() * 100.0
        )?;
        writeln!(
            out,
            "   Mean turns: {:.1} | Mean purse: {:.1} | Average time: {:?}",
            result.mean_turns, result.mean_purse, result.average_duration
        )?;

        if !result.failures.is_empty() {
            writeln!(out, "   Failures:")?;
            for failure in &result.failures {
                writeln!(out, "     • {}", failure.as_str().red())?;
            }
        }
        writeln!(out)?;
    }

    let endings = combined_endings(results);
    let runs = endings.total();
    if runs > 0 {
        writeln!(out, "{}", "🏁 Ending Rates".bright_yellow().bold())?;
        writeln!(out, "{}", "==============".yellow())?;
        writeln!(out, "Won: {:.1}%", percent(endings.won, runs))?;
        writeln!(out, "Collapsed: {:.1}%", percent(endings.collapsed, runs))?;
        writeln!(
            out,
            "All knocked out: {:.1}%",
            percent(endings.all_knocked_out, runs)
        )?;
    }
    Ok(())
}

pub fn generate_json_report(out: &mut dyn Write, results: &[SeedReport]) -> Result<()> {
    let json_output = serde_json::to_string_pretty(results)?;
    writeln!(out, "{json_output}")?;
    Ok(())
}

pub fn generate_markdown_report(out: &mut dyn Write, results: &[SeedReport]) -> Result<()> {
    writeln!(out, "# Expedition Batch Results\n")?;

    let total_seeds = results.len();
    let passed_seeds = results.iter().filter(|r| r.passed).count();
    let endings = combined_endings(results);
    let runs = endings.total();

    writeln!(out, "## Summary\n")?;
    writeln!(out, "- **Total seeds**: {total_seeds}")?;
    writeln!(out, "- **Passed**: {passed_seeds}")?;
    writeln!(out, "- **Failed**: {}", total_seeds - passed_seeds)?;
    writeln!(out, "- **Win rate**: {:.1}%", percent(endings.won, runs))?;
    writeln!(
        out,
        "- **Collapse rate**: {:.1}%",
        percent(endings.collapsed, runs)
    )?;
    writeln!(
        out,
        "- **Knockout rate**: {:.1}%\n",
        percent(endings.all_knocked_out, runs)
    )?;

    writeln!(out, "## Seeds\n")?;
    writeln!(out, "| Seed | Status | Runs | Won | Collapsed | Knocked out | Mean turns |")?;
    writeln!(out, "|------|--------|------|-----|-----------|-------------|------------|")?;
    for result in results {
        let status = if result.passed { "✅" } else { "❌" };
        writeln!(
            out,
            "| {} | {status} | {}/{} | {} | {} | {} | {:.1} |",
            result.seed,
            result.successful_iterations,
            result.iterations_run,
            result.endings.won,
            result.endings.collapsed,
            result.endings.all_knocked_out,
            result.mean_turns
        )?;
    }

    let failing: Vec<&SeedReport> = results.iter().filter(|r| !r.passed).collect();
    if !failing.is_empty() {
        writeln!(out, "\n## Failures\n")?;
        for result in failing {
            for failure in &result.failures {
                writeln!(out, "- seed {}: {failure}", result.seed)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(seed: u64, passed: bool) -> SeedReport {
        SeedReport {
            seed,
            party_size: 3,
            passed,
            iterations_run: 4,
            successful_iterations: if passed { 4 } else { 3 },
            failures: if passed {
                Vec::new()
            } else {
                vec!["Iteration 2 (seed 9, party 3): replay diverged".to_string()]
            },
            endings: EndingTally {
                won: 2,
                collapsed: 1,
                all_knocked_out: if passed { 1 } else { 0 },
            },
            mean_turns: 12.5,
            mean_purse: 140.0,
            average_duration: Duration::from_millis(2),
        }
    }

    fn render(generate: impl FnOnce(&mut dyn Write) -> Result<()>) -> String {
        let mut buffer: Vec<u8> = Vec::new();
        generate(&mut buffer).unwrap();
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn console_report_lists_seeds_and_rates() {
        colored::control::set_override(false);
        let results = [report(1, true), report(2, false)];
        let text = render(|out| generate_console_report(out, &results, Duration::from_secs(1)));
        assert!(text.contains("Expedition Batch Summary"));
        assert!(text.contains("PASS seed 1"));
        assert!(text.contains("FAIL seed 2"));
        assert!(text.contains("replay diverged"));
        assert!(text.contains("Won: 57.1%"));
    }

    #[test]
    fn json_report_round_trips() {
        let results = [report(5, true)];
        let text = render(|out| generate_json_report(out, &results));
        let parsed: Vec<SeedReport> = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed[0].seed, 5);
        assert_eq!(parsed[0].endings, results[0].endings);
    }

    #[test]
    fn markdown_report_has_table_and_failures() {
        let results = [report(1, true), report(2, false)];
        let text = render(|out| generate_markdown_report(out, &results));
        assert!(text.starts_with("# Expedition Batch Results"));
        assert!(text.contains("| 1 | ✅ | 4/4 | 2 | 1 | 1 | 12.5 |"));
        assert!(text.contains("- seed 2: Iteration 2"));
    }
}
