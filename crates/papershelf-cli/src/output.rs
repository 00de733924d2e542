//! Record printing and the interactive confirmation prompt.

use std::io::Write;

use owo_colors::OwoColorize;

use papershelf_core::paper::Paper;
use papershelf_core::reconcile::{Choice, Confirm};
use papershelf_core::record::Field;

/// Print the reconciled record, one field per line.
pub fn print_record(paper: &Paper) {
    let record = paper.record();
    println!("{} {}", "File:".bold(), paper.file_name());
    for field in [
        Field::Title,
        Field::Author,
        Field::Year,
        Field::Journal,
        Field::Publisher,
        Field::Doi,
        Field::Pmid,
        Field::Pmcid,
        Field::Url,
        Field::Keywords,
        Field::Abstract,
        Field::Id,
    ] {
        let value = record.get(field);
        if value.is_unset() {
            continue;
        }
        println!("{:>10}: {}", field.to_string().cyan(), value.render());
    }
    if paper.page_count() > 0 {
        println!("{:>10}: {}", "pages".cyan(), paper.page_count());
    }
}

/// Interactive conflict resolution on stdin.
///
/// Presents both candidate values and accepts the operator's choice;
/// anything other than an explicit yes keeps the current value.
pub struct PromptConfirm;

impl Confirm for PromptConfirm {
    fn resolve(&self, subject: &str, current: &str, incoming: &str) -> Choice {
        println!("{} {}", format!("[{}]", subject).bold().yellow(), "1 -> 2");
        println!("  [1] {}", current);
        println!("  [2] {}", incoming);
        print!("Accept new value? (Yes/No) ");
        let _ = std::io::stdout().flush();

        let mut answer = String::new();
        if std::io::stdin().read_line(&mut answer).is_err() {
            return Choice::KeepCurrent;
        }
        match answer.trim() {
            "y" | "Y" | "yes" | "Yes" => Choice::AcceptIncoming,
            _ => Choice::KeepCurrent,
        }
    }
}
