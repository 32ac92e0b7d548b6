use colored::Colorize;
use similar::{ChangeTag, TextDiff};

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print a dim/muted message
pub fn dim(msg: &str) {
    println!("  {}", msg.dimmed());
}

/// Print a header/title
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.chars().count()).dimmed());
}

/// Print a section header
pub fn section(title: &str) {
    println!();
    println!("{}", title.cyan().bold());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

/// Lines that differ between the requested and re-read state
pub fn diff_lines(expected: &str, observed: &str) -> Vec<(ChangeTag, String)> {
    TextDiff::from_lines(expected, observed)
        .iter_all_changes()
        .filter(|change| change.tag() != ChangeTag::Equal)
        .map(|change| (change.tag(), change.value().trim_end().to_string()))
        .collect()
}

/// Print requested vs re-read state of a group that failed verification
pub fn show_unverified(expected: &str, observed: &str) {
    eprintln!("  {}", "- requested  + re-read".dimmed());
    for (tag, line) in diff_lines(expected, observed) {
        match tag {
            ChangeTag::Delete => eprintln!("    {}", format!("- {line}").red()),
            ChangeTag::Insert => eprintln!("    {}", format!("+ {line}").green()),
            ChangeTag::Equal => {}
        }
    }
}

/// Print what kind of failure `err` is and what to do about it
///
/// The error message itself is left to the caller.
pub fn report(err: &reconcile::Error) {
    let category = err.category();
    error(category.description());
    if let reconcile::Error::RemoteWriteUnverified {
        expected, observed, ..
    } = err.root()
    {
        show_unverified(expected, observed);
    }
    dim(category.advice());
}

// ============================================================================
// Tests
// ============================================================================
