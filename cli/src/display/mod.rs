use colored::Colorize;
use gemaudit_core::{Advisory, Criticality, Report, ScanResult, Version};

/// Text block for one finding, terminated by a blank line.
pub fn format_result(result: &ScanResult, verbose: bool) -> String {
    match result {
        ScanResult::InsecureSource { uri } => {
            format!("{} {}\n\n", "Insecure Source URI found:".yellow(), uri)
        }
        ScanResult::UnpatchedDependency {
            name,
            version,
            advisory,
        } => format_advisory(name, version, advisory, verbose),
    }
}

fn format_advisory(name: &str, version: &Version, advisory: &Advisory, verbose: bool) -> String {
    let criticality = match advisory.criticality() {
        Criticality::High => "High".red().bold(),
        Criticality::Medium => "Medium".yellow(),
        Criticality::Low => "Low".normal(),
        Criticality::Unknown => "Unknown".normal(),
    };

    let mut out = format!(
        "{} {}\n{} {}\n{} {}\n{} {}\n{} {}\n",
        "Name:".red(),
        name,
        "Version:".red(),
        version,
        "Advisory:".red(),
        advisory.primary_identifier(),
        "Criticality:".red(),
        criticality,
        "URL:".red(),
        advisory.url().unwrap_or_default(),
    );

    if verbose {
        out.push_str(&format!("{}\n\n", "Description:".red()));
        for line in advisory.description().unwrap_or_default().trim().lines() {
            out.push_str(&format!("  {}\n", line));
        }
        out.push('\n');
    } else {
        out.push_str(&format!(
            "{} {}\n",
            "Title:".red(),
            advisory.title().unwrap_or_default()
        ));
    }

    if advisory.patched_versions().is_empty() {
        out.push_str(&format!(
            "{} {}\n",
            "Solution:".red(),
            "remove or disable this gem until a patch is available!".red().bold()
        ));
    } else {
        let patched: Vec<String> = advisory
            .patched_versions()
            .iter()
            .map(ToString::to_string)
            .collect();
        out.push_str(&format!(
            "{} {}\n",
            "Solution: upgrade to".red(),
            patched.join(", ")
        ));
    }

    out.push('\n');
    out
}

pub fn format_summary(found: bool) -> String {
    if found {
        "Vulnerabilities found!".red().to_string()
    } else {
        "No vulnerabilities found".green().to_string()
    }
}

pub fn print_json(report: &Report) -> anyhow::Result<String> {
    Ok(report.to_json()?)
}

/// Gems with the most advisories first; ties break by name.
pub fn format_stats(mut counts: Vec<(String, usize)>, top: usize, total: usize) -> String {
    counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    let mut out = format!("Advisories per gem (top {}):\n", top);
    for (gem, count) in counts.iter().take(top) {
        out.push_str(&format!("  {:<30} {}\n", gem, count));
    }
    out.push_str(&format!(
        "\n{} {} advisories across {} gems\n",
        "Total:".bold(),
        total,
        counts.len()
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn advisory(yaml: &str) -> Box<Advisory> {
        Box::new(Advisory::from_yaml("CVE-2013-0156", yaml).unwrap())
    }

    fn unpatched(yaml: &str) -> ScanResult {
        ScanResult::UnpatchedDependency {
            name: "actionpack".to_string(),
            version: Version::parse("3.2.10").unwrap(),
            advisory: advisory(yaml),
        }
    }

    const ACTIONPACK: &str = "gem: actionpack
cve: 2013-0156
url: http://osvdb.org/show/osvdb/89026
title: Ruby on Rails params_parser.rb Action Pack Type Casting Parameter Parsing Remote Code Execution
description: |
  Ruby on Rails contains a flaw in params_parser.rb.
cvss_v2: 10.0
patched_versions:
  - ~> 2.3.15
  - ~> 3.0.19
  - ~> 3.1.10
  - \">= 3.2.11\"
";

    #[test]
    fn test_format_unpatched_dependency() {
        colored::control::set_override(false);
        let text = format_result(&unpatched(ACTIONPACK), false);

        assert!(text.contains("Name: actionpack\n"));
        assert!(text.contains("Version: 3.2.10\n"));
        assert!(text.contains("Advisory: CVE-2013-0156\n"));
        assert!(text.contains("Criticality: High\n"));
        assert!(text.contains("URL: http://osvdb.org/show/osvdb/89026\n"));
        assert!(text.contains("Title: Ruby on Rails params_parser.rb"));
        assert!(text.contains("Solution: upgrade to ~> 2.3.15, ~> 3.0.19, ~> 3.1.10, >= 3.2.11\n"));
        assert!(text.ends_with("\n\n"));
    }

    #[test]
    fn test_unpatched_dependency_block() {
        colored::control::set_override(false);
        let text = format_result(&unpatched(ACTIONPACK), false);

        assert_eq!(
            text,
            "Name: actionpack\n\
             Version: 3.2.10\n\
             Advisory: CVE-2013-0156\n\
             Criticality: High\n\
             URL: http://osvdb.org/show/osvdb/89026\n\
             Title: Ruby on Rails params_parser.rb Action Pack Type Casting Parameter Parsing Remote Code Execution\n\
             Solution: upgrade to ~> 2.3.15, ~> 3.0.19, ~> 3.1.10, >= 3.2.11\n\n"
        );
    }

    #[test]
    fn test_verbose_prints_description() {
        colored::control::set_override(false);
        let text = format_result(&unpatched(ACTIONPACK), true);

        assert!(text.contains("Description:\n\n  Ruby on Rails contains a flaw"));
        assert!(!text.contains("Title:"));
    }

    #[test]
    fn test_no_patch_available() {
        colored::control::set_override(false);
        let text = format_result(&unpatched("gem: actionpack\ncve: 2013-0156\n"), false);

        assert!(text.contains("Criticality: Unknown\n"));
        assert!(text.contains("Solution: remove or disable this gem until a patch is available!"));
    }

    #[test]
    fn test_format_insecure_source() {
        colored::control::set_override(false);
        let text = format_result(
            &ScanResult::InsecureSource {
                uri: "http://rubygems.org/".to_string(),
            },
            false,
        );

        assert_eq!(text, "Insecure Source URI found: http://rubygems.org/\n\n");
    }

    #[test]
    fn test_format_stats() {
        colored::control::set_override(false);
        let counts = vec![
            ("rack".to_string(), 3),
            ("actionpack".to_string(), 5),
            ("activerecord".to_string(), 3),
            ("rake".to_string(), 1),
        ];

        let text = format_stats(counts, 3, 12);
        let lines: Vec<&str> = text.lines().collect();

        assert!(lines[1].trim_start().starts_with("actionpack"));
        assert!(lines[2].trim_start().starts_with("activerecord"));
        assert!(lines[3].trim_start().starts_with("rack"));
        assert!(!text.contains("rake"));
        assert!(text.contains("Total: 12 advisories across 4 gems"));
    }
}
